use crate::error::{AppError, ErrorKind};
use crate::models::classify_types::{ModelStatus, PredictionEntry, WasteCategory};
use crate::models::model_types::{ModelMetadata, ModelTopology};
use crate::services::classifier::inference;
use futures::StreamExt;
use image::DynamicImage;
use ort::session::Session;
use reqwest::Url;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const MODEL_FILE: &str = "model.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Base address of a model: an http(s) URL, a `file://` URL or a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLocator {
    Remote(Url),
    Local(PathBuf),
}

impl ModelLocator {
    pub fn parse(value: &str) -> Result<Self, AppError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::config("Model locator is empty"));
        }

        if value.starts_with("http://") || value.starts_with("https://") {
            // Resources are resolved relative to the locator, so it must name a directory.
            let with_slash = if value.ends_with('/') {
                value.to_string()
            } else {
                format!("{}/", value)
            };
            let url = Url::parse(&with_slash)
                .map_err(|e| AppError::config(format!("Invalid model URL {}: {}", value, e)))?;
            return Ok(ModelLocator::Remote(url));
        }

        if value.starts_with("file://") {
            let url = Url::parse(value)
                .map_err(|e| AppError::config(format!("Invalid model URL {}: {}", value, e)))?;
            let path = url
                .to_file_path()
                .map_err(|_| AppError::config(format!("Invalid file URL: {}", value)))?;
            return Ok(ModelLocator::Local(path));
        }

        Ok(ModelLocator::Local(PathBuf::from(value)))
    }

    fn remote_resource(base: &Url, name: &str) -> Result<Url, AppError> {
        base.join(name)
            .map_err(|e| AppError::model(format!("Cannot resolve {} against {}: {}", name, base, e)))
    }
}

impl fmt::Display for ModelLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelLocator::Remote(url) => write!(f, "{}", url),
            ModelLocator::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A model ready to run, together with the label order of its output.
pub struct LoadedModel {
    pub locator: ModelLocator,
    pub labels: Vec<WasteCategory>,
    pub label_names: Vec<String>,
    pub image_size: u32,
    pub topology: ModelTopology,
    session: std::sync::Mutex<Session>,
}

impl LoadedModel {
    /// Single-image forward pass. Blocking.
    pub fn predict(&self, img: &DynamicImage) -> Result<Vec<PredictionEntry>, AppError> {
        let tensor = inference::preprocess_image(
            img,
            self.image_size,
            self.topology.layout,
            self.topology.normalization,
        )?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| AppError::inference("Model session lock poisoned"))?;

        inference::run_inference_with_model(&mut session, tensor, &self.labels, self.topology.output)
    }
}

/// Local copies of the model resources.
struct ModelFiles {
    topology: PathBuf,
    metadata: PathBuf,
    dir: PathBuf,
}

#[derive(Clone)]
pub struct ModelManager {
    pub cache_dir: PathBuf,
    client: reqwest::Client,
    use_gpu: bool,
    reuse_loaded: bool,
    loaded: Arc<Mutex<Option<Arc<LoadedModel>>>>,
    load_lock: Arc<Mutex<()>>,
    loading: Arc<AtomicBool>,
    error: Arc<Mutex<Option<String>>>,
}

impl ModelManager {
    pub fn new(
        cache_dir: PathBuf,
        timeout: Duration,
        use_gpu: bool,
        reuse_loaded: bool,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            cache_dir,
            client,
            use_gpu,
            reuse_loaded,
            loaded: Arc::new(Mutex::new(None)),
            load_lock: Arc::new(Mutex::new(())),
            loading: Arc::new(AtomicBool::new(false)),
            error: Arc::new(Mutex::new(None)),
        })
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Relaxed)
    }

    pub async fn get_error(&self) -> Option<String> {
        self.error.lock().await.clone()
    }

    pub async fn is_ready(&self, locator: &ModelLocator) -> bool {
        self.loaded
            .lock()
            .await
            .as_ref()
            .map(|m| &m.locator == locator)
            .unwrap_or(false)
    }

    pub async fn status(&self, locator: &ModelLocator) -> ModelStatus {
        let labels = self
            .loaded
            .lock()
            .await
            .as_ref()
            .filter(|m| &m.locator == locator)
            .map(|m| m.label_names.clone())
            .unwrap_or_default();

        ModelStatus {
            locator: Some(locator.to_string()),
            downloaded: self.is_downloaded(locator).await,
            loading: self.is_loading(),
            ready: self.is_ready(locator).await,
            error: self.get_error().await,
            labels,
        }
    }

    /// Cache directory for one remote locator.
    pub fn locator_dir(&self, locator: &ModelLocator) -> PathBuf {
        match locator {
            ModelLocator::Local(dir) => dir.clone(),
            ModelLocator::Remote(url) => {
                let key: String = url
                    .as_str()
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .trim_end_matches('/')
                    .chars()
                    .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
                    .collect();
                self.cache_dir.join(key)
            }
        }
    }

    pub async fn is_downloaded(&self, locator: &ModelLocator) -> bool {
        let dir = self.locator_dir(locator);
        let topology_path = dir.join(MODEL_FILE);
        if !topology_path.exists() || !dir.join(METADATA_FILE).exists() {
            return false;
        }

        match read_json::<ModelTopology>(&topology_path).await {
            Ok(topology) => weights_path(&dir, &topology.weights)
                .map(|p| p.exists())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Make sure `model.json`, `metadata.json` and the weights exist locally.
    async fn download_model(&self, locator: &ModelLocator, refresh: bool) -> Result<ModelFiles, AppError> {
        let dir = self.locator_dir(locator);
        let files = ModelFiles {
            topology: dir.join(MODEL_FILE),
            metadata: dir.join(METADATA_FILE),
            dir: dir.clone(),
        };

        let base = match locator {
            ModelLocator::Local(_) => return Ok(files),
            ModelLocator::Remote(url) => url,
        };

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::model(format!("Failed to create model directory {}: {}", dir.display(), e))
        })?;

        for (name, path) in [(MODEL_FILE, &files.topology), (METADATA_FILE, &files.metadata)] {
            if refresh || !path.exists() {
                let url = ModelLocator::remote_resource(base, name)?;
                download_file(&self.client, &url, path).await?;
            }
        }

        let topology: ModelTopology = read_json(&files.topology).await?;
        let weights = weights_path(&dir, &topology.weights)?;
        if refresh || !weights.exists() {
            if let Some(parent) = weights.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let url = ModelLocator::remote_resource(base, &topology.weights)?;
            download_file(&self.client, &url, &weights).await?;
        }

        Ok(files)
    }

    /// Load (or reuse) the model at `locator`.
    pub async fn load_model(&self, locator: &ModelLocator) -> Result<Arc<LoadedModel>, AppError> {
        // Concurrent callers wait here and then find the cached model.
        let _guard = self.load_lock.lock().await;

        if self.reuse_loaded {
            if let Some(model) = self.loaded.lock().await.as_ref() {
                if &model.locator == locator {
                    return Ok(model.clone());
                }
            }
        }

        self.loading.store(true, Ordering::Relaxed);
        *self.error.lock().await = None;

        let start = Instant::now();
        let result = self.do_load_model(locator).await;

        self.loading.store(false, Ordering::Relaxed);

        match result {
            Ok(model) => {
                let model = Arc::new(model);
                *self.loaded.lock().await = Some(model.clone());
                log::info!(
                    "Loaded model from {} ({} labels, {}px) in {:.0}ms",
                    locator,
                    model.labels.len(),
                    model.image_size,
                    start.elapsed().as_secs_f64() * 1000.0
                );
                Ok(model)
            }
            Err(e) => {
                let e = e.with_kind(ErrorKind::ModelLoad);
                log::error!("Failed to load model from {}: {}", locator, e);
                *self.error.lock().await = Some(e.message.clone());
                Err(e)
            }
        }
    }

    async fn do_load_model(&self, locator: &ModelLocator) -> Result<LoadedModel, AppError> {
        let files = self.download_model(locator, !self.reuse_loaded).await?;

        let topology: ModelTopology = read_json(&files.topology).await?;
        if !topology.format.eq_ignore_ascii_case("onnx") {
            return Err(AppError::model(format!(
                "Unsupported model format '{}', expected onnx",
                topology.format
            )));
        }

        let metadata: ModelMetadata = read_json(&files.metadata).await?;
        let labels = map_labels(&metadata.labels)?;
        if metadata.image_size == 0 {
            return Err(AppError::model("metadata.json imageSize must be positive"));
        }

        let weights_file = weights_path(&files.dir, &topology.weights)?;
        if !weights_file.exists() {
            return Err(AppError::model(format!(
                "Weights file not found: {}",
                weights_file.display()
            )));
        }

        let use_gpu = self.use_gpu;
        let session = tokio::task::spawn_blocking(move || -> Result<Session, AppError> {
            let _ = ort::init().with_name("biosort").commit();

            let mut builder = Session::builder()
                .map_err(|e| AppError::model(format!("Failed to create session builder: {}", e)))?
                .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
                .map_err(|e| AppError::model(format!("Failed to set optimization level: {}", e)))?
                .with_intra_threads(4)
                .map_err(|e| AppError::model(format!("Failed to set intra threads: {}", e)))?;

            if use_gpu {
                builder = builder
                    .with_execution_providers([
                        ort::execution_providers::CUDAExecutionProvider::default().build(),
                        ort::execution_providers::CoreMLExecutionProvider::default().build(),
                        ort::execution_providers::CPUExecutionProvider::default().build(),
                    ])
                    .map_err(|e| {
                        AppError::model(format!("Failed to register GPU execution providers: {}", e))
                    })?;
            } else {
                builder = builder
                    .with_execution_providers([
                        ort::execution_providers::CPUExecutionProvider::default().build(),
                    ])
                    .map_err(|e| {
                        AppError::model(format!("Failed to register CPU execution provider: {}", e))
                    })?;
            }

            builder
                .commit_from_file(&weights_file)
                .map_err(|e| AppError::model(format!("Failed to load ONNX model: {}", e)))
        })
        .await
        .map_err(|e| AppError::model(format!("Failed to spawn model loading task: {}", e)))??;

        Ok(LoadedModel {
            locator: locator.clone(),
            labels,
            label_names: metadata.labels,
            image_size: metadata.image_size,
            topology,
            session: std::sync::Mutex::new(session),
        })
    }

    /// Load the model if needed and classify one decoded image.
    pub async fn classify(
        &self,
        locator: &ModelLocator,
        img: &DynamicImage,
    ) -> Result<Vec<PredictionEntry>, AppError> {
        let model = self.load_model(locator).await?;
        let img = img.clone();

        let start = Instant::now();
        let predictions = tokio::task::spawn_blocking(move || model.predict(&img))
            .await
            .map_err(|e| AppError::inference(format!("Inference task failed: {}", e)))??;
        log::debug!("Inference took {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);

        Ok(predictions)
    }
}

/// Map metadata labels (model output order) onto the fixed category set.
pub fn map_labels(labels: &[String]) -> Result<Vec<WasteCategory>, AppError> {
    let mut mapped = Vec::with_capacity(labels.len());
    for label in labels {
        let category = WasteCategory::from_label(label)
            .ok_or_else(|| AppError::model(format!("Unknown label in metadata.json: '{}'", label)))?;
        if mapped.contains(&category) {
            return Err(AppError::model(format!(
                "Label '{}' maps to {} which is already taken",
                label, category
            )));
        }
        mapped.push(category);
    }

    if let Some(missing) = WasteCategory::ALL.iter().find(|c| !mapped.contains(c)) {
        return Err(AppError::model(format!("metadata.json has no label for {}", missing)));
    }

    Ok(mapped)
}

/// Resolve the weights file named by `model.json` inside the model directory.
///
/// Only plain relative paths are accepted: no scheme, no root, no `..`.
pub fn weights_path(dir: &Path, weights: &str) -> Result<PathBuf, AppError> {
    let invalid = |why: &str| AppError::model(format!("Invalid weights path '{}' in model.json: {}", weights, why));

    if weights.trim().is_empty() {
        return Err(invalid("empty"));
    }
    if weights.contains("://") || weights.contains('\\') {
        return Err(invalid("must be a relative file name"));
    }
    let relative = Path::new(weights);
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(invalid("must stay inside the model directory"));
    }

    let path = dir.join(relative);
    if !path.starts_with(dir) {
        return Err(invalid("must stay inside the model directory"));
    }
    Ok(path)
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::model(format!("Failed to read {}: {}", path.display(), e)))?;

    serde_json::from_str(&content)
        .map_err(|e| AppError::model(format!("Failed to parse {}: {}", path.display(), e)))
}

async fn download_file(client: &reqwest::Client, url: &Url, dest: &Path) -> Result<(), AppError> {
    log::info!("Downloading {}", url);
    let response = client.get(url.clone()).send().await?;

    if !response.status().is_success() {
        return Err(AppError::model(format!(
            "Failed to download {}: HTTP {}",
            url,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    // Written under a temporary name so an interrupted download never looks cached.
    let partial = PathBuf::from(format!("{}.part", dest.display()));
    let mut file = tokio::fs::File::create(&partial).await.map_err(|e| {
        AppError::model(format!("Failed to create file {}: {}", partial.display(), e))
    })?;

    let mut stream = response.bytes_stream();
    let mut last_logged = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e.into());
            }
        };
        downloaded += chunk.len() as u64;
        if let Err(e) = tokio::io::AsyncWriteExt::write_all(&mut file, &chunk).await {
            drop(file);
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(AppError::model(format!("Failed to write to file: {}", e)));
        }

        if total_size > 0 {
            let progress = (downloaded * 100) / total_size;
            if progress >= last_logged + 10 {
                log::debug!("{}: {}%", url, progress);
                last_logged = progress;
            }
        }
    }
    let flushed = tokio::io::AsyncWriteExt::flush(&mut file).await;
    drop(file);
    if let Err(e) = flushed {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(AppError::model(format!("Failed to write {}: {}", partial.display(), e)));
    }

    tokio::fs::rename(&partial, dest).await.map_err(|e| {
        AppError::model(format!("Failed to move {} into place: {}", dest.display(), e))
    })?;

    Ok(())
}
