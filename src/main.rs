use std::{error::Error, fs::read_to_string, path::Path, sync::Arc};

use clap::Parser;
use gantry::{
    app::FileViewEngine,
    config::{Protocol, SecurityConfig, StrategyConfig},
    strategy::{exception_fn, render_output, route_fn, HttpStrategy, Output, ServerStrategy, View},
    Layer,
};
use http::StatusCode;
use log::{error, info};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct GantrySecurityConfig {
    cert: String,
    key: String,
    ca_cert: Option<String>,
    #[serde(default)]
    client_auth: bool,
}

#[derive(Deserialize)]
pub struct GantryServeConfig {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_interface")]
    interface: String,
    backlog: Option<u32>,
    protocol: Option<Protocol>,
    security: Option<GantrySecurityConfig>,
    views: Option<String>,
}

impl Default for GantryServeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            interface: default_interface(),
            backlog: None,
            protocol: None,
            security: None,
            views: None,
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_interface() -> String {
    "0.0.0.0".to_string()
}

#[derive(Parser)]
#[command(
    name = "gantry",
    about = "gantry - a pluggable http server strategy",
    long_about = r#"
gantry - a pluggable http server strategy

Usage:
    gantry [OPTIONS]

Options:
    -h, --help       Print help information
    -V, --version    Print version information
    -c, --config     <CONFIG>
                     YAML config file to use
"#
)]
struct Args {
    #[arg(short, long, required = false, help = "YAML config file to use.")]
    config: Option<String>,
}

fn load_config(path: &str) -> Result<GantryServeConfig, Box<dyn Error>> {
    if !Path::exists(Path::new(path)) {
        return Err(format!("Config file {} not found", path).into());
    }

    let file = read_to_string(path)?;
    Ok(serde_yaml_ng::from_str::<GantryServeConfig>(&file)?)
}

fn strategy_config(config: &GantryServeConfig) -> Result<StrategyConfig, Box<dyn Error>> {
    let mut builder = StrategyConfig::builder();

    if let Some(protocol) = &config.protocol {
        builder = builder.protocol(protocol.clone());
    }

    if let Some(security) = &config.security {
        let mut security_builder = SecurityConfig::builder()
            .cert_from_file(&security.cert)
            .key_from_file(&security.key)
            .client_auth(security.client_auth);
        if let Some(ca_cert) = &security.ca_cert {
            security_builder = security_builder.ca_cert_from_file(ca_cert);
        }
        builder = builder.security(security_builder.build()?);
    }

    Ok(builder.build())
}

async fn run() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = match args.config {
        Some(path) => load_config(&path)?,
        None => GantryServeConfig::default(),
    };

    let mut strategy = HttpStrategy::new(strategy_config(&config)?);

    if let Some(views) = &config.views {
        strategy.set("views", views.as_str().into());
    }
    strategy
        .server()
        .engine(Arc::new(FileViewEngine::default()));

    strategy.use_middleware(Layer::middleware(gantry::app::middleware_fn(
        |request, _response, next| async move {
            info!("{} {}", request.method(), request.path());
            next.proceed();
        },
    )));

    strategy.add_route(
        "get",
        "/health",
        route_fn(|_request, response| async move {
            response.json(&serde_json::json!({ "status": "ok" }))
        }),
    )?;

    strategy.add_route(
        "get",
        "/hello/:name",
        route_fn(|request, response| async move {
            let name = request
                .param("name")
                .unwrap_or("world")
                .to_string();
            let view = View::builder()
                .template("hello")
                .data(serde_json::json!({ "name": name }))
                .build();
            render_output(StatusCode::OK, Output::view(view), &request, &response)
        }),
    )?;

    strategy.uncaught_exception(exception_fn(|request, _response, error, next| async move {
        error!("Unhandled error on {} {}: {}", request.method(), request.path(), error);
        next.fail(error);
    }));

    strategy
        .start(config.port, &config.interface, config.backlog)
        .await?;

    tokio::signal::ctrl_c().await?;

    strategy
        .close()
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run().await {
        error!("Failed to start server: {}", e);
    }
    Ok(())
}
