use std::io::{self, Write};

use async_trait::async_trait;
use env_logger::Builder;
use tokio::{
    fs::{create_dir_all, metadata, File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        watch, Mutex,
    },
    task::JoinHandle,
};

use crate::{
    config,
    core::{context::Context, error::ServiceResult, traits::Service},
};

/// Context key under which the log file path is published
pub const LOG_PATH_KEY: &str = "log.path";

/// Install a stderr logger at the configured level. Returns false when a
/// logger was already installed.
pub fn init_env_logger(config: &config::Log) -> bool {
    Builder::from_env(env_logger::Env::default())
        .filter(None, config.level_filter())
        .try_init()
        .is_ok()
}

pub struct AsyncWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl Write for AsyncWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let data = buf.to_vec();
        self.sender
            .send(data)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// File log sink driven by the service lifecycle.
///
/// `init` opens the file, `start` spawns the writer task, `stop` drains the
/// channel and flushes.
pub struct Logger {
    sender: UnboundedSender<Vec<u8>>,
    receiver: Mutex<Option<UnboundedReceiver<Vec<u8>>>>,
    file: Mutex<Option<BufWriter<File>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    path: String,
    config: config::Log,
}

impl Logger {
    /// Create a logger writing to `config.path`, or `wireup.log` when unset
    pub fn new(config: config::Log) -> Self {
        let (sender, receiver) = unbounded_channel::<Vec<u8>>();
        let (shutdown, _) = watch::channel(false);
        let path = config
            .path
            .clone()
            .unwrap_or_else(|| "wireup.log".to_string());
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            file: Mutex::new(None),
            writer: Mutex::new(None),
            shutdown,
            path,
            config,
        }
    }

    pub fn create_async_writer(&self) -> AsyncWriter {
        AsyncWriter {
            sender: self.sender.clone(),
        }
    }

    /// Route the global logger into this sink. Returns false when a logger
    /// was already installed.
    pub fn init_env_logger(&self) -> bool {
        let writer = self.create_async_writer();
        Builder::from_env(env_logger::Env::default())
            .filter(None, self.config.level_filter())
            .target(env_logger::Target::Pipe(Box::new(writer)))
            .try_init()
            .is_ok()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Service for Logger {
    fn name(&self) -> &str {
        "log sync"
    }

    async fn init(&self, ctx: &Context) -> ServiceResult<Context> {
        if let Some(parent) = std::path::Path::new(&self.path).parent() {
            if !parent.as_os_str().is_empty() && metadata(parent).await.is_err() {
                create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        *self.file.lock().await = Some(BufWriter::new(file));

        Ok(ctx.with_value(LOG_PATH_KEY, self.path.clone()))
    }

    async fn start(&self, ctx: &Context) -> ServiceResult<Context> {
        let mut file = self.file.lock().await.take().ok_or("log file is not open")?;
        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or("log sink already started")?;
        let mut shutdown = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    // Shutdown signal handling
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    },

                    data = receiver.recv() => {
                        match data {
                            Some(data) => {
                                if let Err(e) = file.write_all(&data).await {
                                    eprintln!("Failed to write to log file: {e}");
                                }
                            }
                            None => break,
                        }
                    }
                }
            }

            // keep what was queued before shutdown
            while let Ok(data) = receiver.try_recv() {
                if let Err(e) = file.write_all(&data).await {
                    eprintln!("Failed to write to log file: {e}");
                }
            }

            if let Err(e) = file.flush().await {
                eprintln!("Failed to flush log file: {e}");
            }
        });
        *self.writer.lock().await = Some(handle);

        Ok(ctx.clone())
    }

    async fn stop(&self, _ctx: &Context) {
        self.shutdown.send_replace(true);
        if let Some(handle) = self.writer.lock().await.take() {
            if let Err(e) = handle.await {
                eprintln!("Log writer task failed: {e}");
            }
        }
    }

    async fn finit(&self, _ctx: &Context) {
        // only set when start never ran
        if let Some(mut file) = self.file.lock().await.take() {
            if let Err(e) = file.flush().await {
                eprintln!("Failed to flush log file: {e}");
            }
        }
    }
}
