//! routerhttp demo server.
//!
//! Serves a few example routes over HTTP and a chat room over WebSocket:
//! every message a client sends is broadcast to all connected clients.

use std::path::PathBuf;

use anyhow::Context as _;
use routerhttp::core::html_escape;
use routerhttp::prelude::*;
use routerhttp::telemetry::{init_logging, init_metrics};
use serde_json::json;
use tracing::{info, warn};

/// Port the chat room listens on.
const CHAT_PORT: u16 = 9001;

const HELLO_TEMPLATE: &str =
    "<html><body><h1>Hello, <?= name ?>!</h1><p>You asked for <?= url ?>.</p></body></html>";

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("routerhttp-demo {}", routerhttp::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"routerhttp demo - embedded HTTP and WebSocket server

USAGE:
    routerhttp-demo [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    ROUTERHTTP__SERVER__HTTP_ADDR             HTTP bind address (default: 0.0.0.0:8080)
    ROUTERHTTP__SERVER__HEADER_TIMEOUT_MS     Request head timeout in milliseconds
    ROUTERHTTP__WEBSOCKET__MAX_CONNECTIONS    WebSocket connection limit (default: -1, unlimited)
    ROUTERHTTP__LOGGING__LEVEL                Log filter (default: info)
    ROUTERHTTP__METRICS__ENABLED              Serve Prometheus metrics (default: false)

ROUTES:
    GET  /                  Index page
    GET  /hello/<name>      Rendered greeting
    POST /api/echo          Echoes a form or JSON body as JSON
    GET  /api/stats         WebSocket registry statistics
    ws://<host>:9001/       Chat room
"
    );
}

fn not_found_page(url: &str) -> String {
    format!(
        "<html><body><h1>Not found</h1><p>{}</p></body></html>",
        html_escape(url)
    )
}

fn routes(connections: &Arc<ConnectionRegistry>) -> anyhow::Result<RouteRegistry> {
    let mut routes = RouteRegistry::new();

    routes.add_route("GET", "/", |ctx: &mut HttpContext, _args: &[String]| {
        ctx.response_mut()
            .set_body("<html><body><h1>routerhttp</h1></body></html>");
        StatusCode::OK
    })?;

    routes.add_route("GET", r"/hello/(\w+)", |ctx: &mut HttpContext, args: &[String]| {
        let page = ctx.render(
            HELLO_TEMPLATE,
            &json!({ "name": args[0], "url": html_escape(ctx.request().url()) }),
        )?;
        ctx.response_mut().set_body(page);

        let name = args[0].clone();
        ctx.spawn_background(async move {
            info!(name, "greeted");
        });
        Ok::<_, HandlerError>(StatusCode::OK)
    })?;

    routes.add_route("POST", "/api/echo", |ctx: &mut HttpContext, _args: &[String]| {
        let body = match ctx.request().body() {
            Body::Form(form) => json!(form),
            Body::Json(value) => value.clone(),
            Body::Empty => serde_json::Value::Null,
        };
        ctx.response_mut().set_json(&json!({ "received": body }))?;
        Ok::<_, HandlerError>(StatusCode::OK)
    })?;

    let stats_registry = Arc::clone(connections);
    routes.add_route("GET", "/api/stats", move |ctx: &mut HttpContext, _args: &[String]| {
        let stats = stats_registry.stats();
        ctx.response_mut().set_json(&json!({
            "active": stats.active_connections,
            "accepted": stats.total_accepted,
            "rejected": stats.total_rejected,
            "closed": stats.total_closed,
            "reaped": stats.total_reaped,
        }))?;
        Ok::<_, HandlerError>(StatusCode::OK)
    })?;

    routes.add_status_handler(StatusCode::NOT_FOUND, |ctx: &mut HttpContext| {
        let page = not_found_page(ctx.request().url());
        ctx.response_mut().set_body(page);
    });

    let room = Arc::clone(connections);
    routes.add_websocket(CHAT_PORT, move |conn: Arc<WebSocketConnection>| {
        let room = Arc::clone(&room);
        async move {
            let who = conn
                .remote_addr()
                .map_or_else(|| conn.id().to_string(), |addr| addr.to_string());
            room.broadcast(format!("{who} joined")).await;

            while let Ok(Some(text)) = conn.recv().await {
                room.broadcast(format!("{who}: {text}")).await;
            }

            conn.close().await;
            room.broadcast(format!("{who} left")).await;
        }
    });

    Ok(routes)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader
            .with_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
    }
    let config = loader
        .with_dotenv()
        .with_env_prefix("ROUTERHTTP")
        .load()
        .context("invalid configuration")?;

    init_logging(&config.log_config())?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: RouterHttpConfig) -> anyhow::Result<()> {
    if let Err(e) = init_metrics(&config.metrics_config()) {
        warn!(error = %e, "Metrics disabled");
    }

    let server_config = config.server_config();
    let connections = ConnectionRegistry::with_config(server_config.registry().clone());

    let mut routes = routes(&connections)?;
    config.apply_mounts(&mut routes)?;

    info!(version = routerhttp::VERSION, "Starting routerhttp demo");
    Server::new(server_config, routes)
        .with_connections(connections)
        .listen()
        .await?;
    Ok(())
}
