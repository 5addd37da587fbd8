use std::{process, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;

use wireup::{
    config::Config,
    core::{Capability, Context, Injector, ServiceResult, Service},
    logging::{init_env_logger, Logger},
    orchestration::Bootstrap,
};

/// Storage backend the greeter depends on
trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

struct MemoryKvStore {
    greeting: String,
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        (key == "greeting").then(|| self.greeting.clone())
    }
}

struct Greeter {
    store: Arc<dyn KvStore>,
    ticker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

#[async_trait]
impl Service for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }

    async fn init(&self, ctx: &Context) -> ServiceResult<Context> {
        let greeting = self.store.get("greeting").ok_or("no greeting configured")?;
        Ok(ctx.with_value("greeting", greeting))
    }

    async fn start(&self, ctx: &Context) -> ServiceResult<Context> {
        let greeting = ctx.get_str("greeting").unwrap_or("hello").to_string();
        let user = ctx.get_str("user").unwrap_or("world").to_string();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            loop {
                interval.tick().await;
                log::info!("{greeting}, {user}");
            }
        });
        *self.ticker.lock().await = Some(handle);
        Ok(ctx.clone())
    }

    async fn stop(&self, _ctx: &Context) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }
}

#[tokio::main]
async fn main() {
    // Load configuration, falling back to defaults without a path
    let config = match std::env::args().nth(1) {
        Some(path) => match Config::load_from_yaml(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                process::exit(1);
            }
        },
        None => Config::default(),
    };

    let mut bootstrap = Bootstrap::with_config(&config.lifecycle);

    // Route logs to the file sink when configured
    match &config.log.path {
        Some(_) => {
            let logger = Logger::new(config.log.clone());
            logger.init_env_logger();
            bootstrap.provide_service(logger);
        }
        None => {
            init_env_logger(&config.log);
        }
    }

    log::info!("Declaring services...");
    bootstrap
        .declarations()
        .provide::<Arc<dyn KvStore>>(Arc::new(MemoryKvStore {
            greeting: "hello".to_string(),
        }));
    bootstrap.provide_service_with(
        [Capability::of::<Arc<dyn KvStore>>()],
        |injector: &Injector| {
            Ok(Greeter {
                store: injector.resolve::<Arc<dyn KvStore>>()?,
                ticker: Mutex::new(None),
            })
        },
    );

    log::info!("Starting services...");
    let ctx = Context::new().with_value("user", std::env::var("USER").unwrap_or_default());
    if let Err(e) = bootstrap.run(ctx).await {
        log::error!("Shutdown with error: {e}");
        process::exit(1);
    }
}
