use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
    features: Features,
}

#[derive(Serialize)]
struct Features {
    cli: bool,
    #[serde(rename = "async")]
    async_codec: bool,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("msgserve {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let info = VersionInfo {
        name: "msgserve",
        version: env!("CARGO_PKG_VERSION"),
        target: option_env!("MSGSERVE_BUILD_TARGET").unwrap_or("unknown"),
        target_os: std::env::consts::OS,
        target_arch: std::env::consts::ARCH,
        features: Features {
            cli: true,
            async_codec: cfg!(feature = "async"),
        },
    };

    if let OutputFormat::Json = format {
        println!(
            "{}",
            serde_json::to_string(&info).unwrap_or_else(|_| "{}".to_string())
        );
        return Ok(SUCCESS);
    }

    println!("name: {}", info.name);
    println!("version: {}", info.version);
    println!("target: {}", info.target);
    println!("target_os: {}", info.target_os);
    println!("target_arch: {}", info.target_arch);
    println!(
        "features: cli={}, async={}",
        info.features.cli, info.features.async_codec
    );

    Ok(SUCCESS)
}
