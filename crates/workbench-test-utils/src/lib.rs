//! Testing utilities for the workbench workspace
//!
//! Fixture models and algorithms, registries holding them, and a tiny
//! protocol client.

#![allow(missing_docs)]

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use workbench_core::{
    gzip, Algorithm, AlgorithmError, AlgorithmRegistry, DeserializeError, LockedModels, Model,
    ModelId, ModelRegistry, OpaqueModel, XmlDocument, XmlElement,
};

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// Small grayscale image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageModel {
    pub id: ModelId,
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<f32>,
}

impl ImageModel {
    pub const TYPE: &'static str = "Image";

    pub fn new(id: &str, width: usize, height: usize) -> Self {
        let pixels = (0..width * height).map(|i| i as f32).collect();
        Self {
            id: ModelId::new(id),
            width,
            height,
            pixels,
        }
    }

    pub fn from_xml(el: &XmlElement) -> Result<Self, DeserializeError> {
        let attr = |name: &str| {
            el.attr(name)
                .ok_or_else(|| DeserializeError::missing_attribute(el.name.clone(), name))
        };
        let dim = |name: &str| -> Result<usize, DeserializeError> {
            let raw = attr(name)?;
            raw.parse()
                .map_err(|_| DeserializeError::invalid_value(name, raw))
        };

        let id = ModelId::new(attr("id")?);
        let width = dim("width")?;
        let height = dim("height")?;
        let pixels = el
            .text()
            .split_whitespace()
            .map(|v| {
                v.parse::<f32>()
                    .map_err(|_| DeserializeError::invalid_value("pixels", v))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if pixels.len() != width * height {
            return Err(DeserializeError::Invalid(format!(
                "expected {} pixels, got {}",
                width * height,
                pixels.len()
            )));
        }
        Ok(Self {
            id,
            width,
            height,
            pixels,
        })
    }

    pub fn deserializer() -> workbench_core::Deserializer<dyn Model> {
        Box::new(|el| Ok(Box::new(Self::from_xml(el)?) as Box<dyn Model>))
    }
}

impl Model for ImageModel {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn id(&self) -> &ModelId {
        &self.id
    }

    fn to_xml(&self) -> XmlElement {
        let pixels: Vec<String> = self.pixels.iter().map(ToString::to_string).collect();
        XmlElement::new(Self::TYPE)
            .with_attr("id", self.id.as_str())
            .with_attr("width", self.width.to_string())
            .with_attr("height", self.height.to_string())
            .with_text(pixels.join(" "))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Algorithms
// ---------------------------------------------------------------------------

fn source_attr(el: &XmlElement, name: &str) -> Result<ModelId, DeserializeError> {
    el.attr(name)
        .map(ModelId::new)
        .ok_or_else(|| DeserializeError::missing_attribute(el.name.clone(), name))
}

/// Produces `copies` renamed copies of an image
#[derive(Debug, Clone)]
pub struct CopyAlgorithm {
    pub source: ModelId,
    pub copies: usize,
}

impl CopyAlgorithm {
    pub const TYPE: &'static str = "Copy";

    pub fn new(source: &str, copies: usize) -> Self {
        Self {
            source: ModelId::new(source),
            copies,
        }
    }

    pub fn copy_id(source: &str, n: usize) -> String {
        format!("{source}_copy{n}")
    }

    pub fn from_xml(el: &XmlElement) -> Result<Self, DeserializeError> {
        let source = source_attr(el, "source")?;
        let raw = el.attr("copies").unwrap_or("1");
        let copies = raw
            .parse()
            .map_err(|_| DeserializeError::invalid_value("copies", raw))?;
        Ok(Self { source, copies })
    }
}

impl Algorithm for CopyAlgorithm {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn parameters_valid(&self) -> bool {
        !self.source.as_str().is_empty()
    }

    fn model_refs(&self) -> Vec<ModelId> {
        vec![self.source.clone()]
    }

    fn run(&mut self, models: &mut LockedModels<'_>) -> Result<Vec<Box<dyn Model>>, AlgorithmError> {
        let source = models
            .get(&self.source)
            .and_then(|m| m.as_any().downcast_ref::<ImageModel>())
            .ok_or_else(|| AlgorithmError::new(format!("{} is not an image", self.source)))?;

        Ok((1..=self.copies)
            .map(|n| {
                let mut copy = source.clone();
                copy.id = ModelId::new(Self::copy_id(self.source.as_str(), n));
                Box::new(copy) as Box<dyn Model>
            })
            .collect())
    }

    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::TYPE)
            .with_attr("source", self.source.as_str())
            .with_attr("copies", self.copies.to_string())
    }
}

/// Multiplies an image in place and returns the scaled image
#[derive(Debug, Clone)]
pub struct ScaleAlgorithm {
    pub target: ModelId,
    pub factor: f32,
}

impl ScaleAlgorithm {
    pub const TYPE: &'static str = "Scale";

    pub fn new(target: &str, factor: f32) -> Self {
        Self {
            target: ModelId::new(target),
            factor,
        }
    }

    pub fn from_xml(el: &XmlElement) -> Result<Self, DeserializeError> {
        let target = source_attr(el, "target")?;
        let raw = el
            .attr("factor")
            .ok_or_else(|| DeserializeError::missing_attribute(el.name.clone(), "factor"))?;
        let factor = raw
            .parse()
            .map_err(|_| DeserializeError::invalid_value("factor", raw))?;
        Ok(Self { target, factor })
    }
}

impl Algorithm for ScaleAlgorithm {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn model_refs(&self) -> Vec<ModelId> {
        vec![self.target.clone()]
    }

    fn run(&mut self, models: &mut LockedModels<'_>) -> Result<Vec<Box<dyn Model>>, AlgorithmError> {
        let image = models
            .get_mut(&self.target)
            .and_then(|m| m.as_any_mut().downcast_mut::<ImageModel>())
            .ok_or_else(|| AlgorithmError::new(format!("{} is not an image", self.target)))?;

        for p in &mut image.pixels {
            *p *= self.factor;
        }
        Ok(vec![Box::new(image.clone())])
    }

    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::TYPE)
            .with_attr("target", self.target.as_str())
            .with_attr("factor", self.factor.to_string())
    }
}

/// Always fails with its message
#[derive(Debug, Clone)]
pub struct FailingAlgorithm {
    pub message: String,
}

impl FailingAlgorithm {
    pub const TYPE: &'static str = "Fail";

    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl Algorithm for FailingAlgorithm {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn model_refs(&self) -> Vec<ModelId> {
        Vec::new()
    }

    fn run(&mut self, _models: &mut LockedModels<'_>) -> Result<Vec<Box<dyn Model>>, AlgorithmError> {
        Err(AlgorithmError::new(self.message.clone()))
    }

    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::TYPE).with_attr("message", self.message.as_str())
    }
}

/// Panics while holding its model
#[derive(Debug, Clone)]
pub struct PanickingAlgorithm {
    pub target: Option<ModelId>,
}

impl PanickingAlgorithm {
    pub const TYPE: &'static str = "Panic";
}

impl Algorithm for PanickingAlgorithm {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn model_refs(&self) -> Vec<ModelId> {
        self.target.iter().cloned().collect()
    }

    fn run(&mut self, _models: &mut LockedModels<'_>) -> Result<Vec<Box<dyn Model>>, AlgorithmError> {
        panic!("algorithm blew up");
    }

    fn to_xml(&self) -> XmlElement {
        let el = XmlElement::new(Self::TYPE);
        match &self.target {
            Some(target) => el.with_attr("target", target.as_str()),
            None => el,
        }
    }
}

/// Holds its model for a while, counting how many runs overlap
#[derive(Debug, Clone)]
pub struct SleepAlgorithm {
    pub target: ModelId,
    pub millis: u64,
    pub probe: Arc<OverlapProbe>,
}

impl SleepAlgorithm {
    pub const TYPE: &'static str = "Sleep";
}

impl Algorithm for SleepAlgorithm {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn model_refs(&self) -> Vec<ModelId> {
        vec![self.target.clone()]
    }

    fn run(&mut self, _models: &mut LockedModels<'_>) -> Result<Vec<Box<dyn Model>>, AlgorithmError> {
        self.probe.enter();
        std::thread::sleep(Duration::from_millis(self.millis));
        self.probe.leave();
        Ok(Vec::new())
    }

    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::TYPE)
            .with_attr("target", self.target.as_str())
            .with_attr("millis", self.millis.to_string())
    }
}

/// Records the largest number of simultaneously running jobs
#[derive(Debug, Default)]
pub struct OverlapProbe {
    running: AtomicUsize,
    max_seen: AtomicUsize,
}

impl OverlapProbe {
    pub fn enter(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
    }

    pub fn leave(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_overlap(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// Images plus opaque fallback
pub fn model_registry() -> ModelRegistry {
    ModelRegistry::new("model")
        .with(ImageModel::TYPE, ImageModel::deserializer())
        .with_fallback(OpaqueModel::deserializer())
}

/// Copy, Scale, Fail, Panic, and Sleep sharing `probe`
pub fn algorithm_registry(probe: Arc<OverlapProbe>) -> AlgorithmRegistry {
    AlgorithmRegistry::new("algorithm")
        .with(
            CopyAlgorithm::TYPE,
            Box::new(|el| Ok(Box::new(CopyAlgorithm::from_xml(el)?) as Box<dyn Algorithm>)),
        )
        .with(
            ScaleAlgorithm::TYPE,
            Box::new(|el| Ok(Box::new(ScaleAlgorithm::from_xml(el)?) as Box<dyn Algorithm>)),
        )
        .with(
            FailingAlgorithm::TYPE,
            Box::new(|el| {
                let message = el.attr("message").unwrap_or_default();
                Ok(Box::new(FailingAlgorithm::new(message)) as Box<dyn Algorithm>)
            }),
        )
        .with(
            PanickingAlgorithm::TYPE,
            Box::new(|el| {
                let target = el.attr("target").map(ModelId::new);
                Ok(Box::new(PanickingAlgorithm { target }) as Box<dyn Algorithm>)
            }),
        )
        .with(
            SleepAlgorithm::TYPE,
            Box::new(move |el| {
                let target = source_attr(el, "target")?;
                let raw = el.attr("millis").unwrap_or("0");
                let millis = raw
                    .parse()
                    .map_err(|_| DeserializeError::invalid_value("millis", raw))?;
                Ok(Box::new(SleepAlgorithm {
                    target,
                    millis,
                    probe: Arc::clone(&probe),
                }) as Box<dyn Algorithm>)
            }),
        )
}

// ---------------------------------------------------------------------------
// Wire helpers
// ---------------------------------------------------------------------------

/// Gzip-compressed XML of `root`
pub fn compressed(root: XmlElement) -> Vec<u8> {
    let xml = XmlDocument::new(root).to_bytes().unwrap();
    gzip::compress(&xml).unwrap()
}

pub fn login_line(user: &str, pass: &str) -> Vec<u8> {
    format!("login:{user}:{pass}\n").into_bytes()
}

/// `<kind>:<n>\n` followed by `payload`
pub fn frame(kind: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = format!("{kind}:{}\n", payload.len()).into_bytes();
    out.extend_from_slice(payload);
    out
}

pub fn model_frame(model: &dyn Model) -> Vec<u8> {
    frame("Model", &compressed(model.to_xml()))
}

pub fn algorithm_frame(algorithm: &dyn Algorithm) -> Vec<u8> {
    frame("Algorithm", &compressed(algorithm.to_xml()))
}

/// Minimal protocol client over any stream
pub struct TestClient<S> {
    stream: BufReader<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> TestClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.stream.get_mut().write_all(bytes).await.unwrap();
        self.stream.get_mut().flush().await.unwrap();
    }

    pub async fn login(&mut self, user: &str, pass: &str) {
        self.send(&login_line(user, pass)).await;
    }

    /// Read exactly `n` bytes
    pub async fn read_exact(&mut self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.stream.read_exact(&mut buf).await.unwrap();
        buf
    }

    /// Read a `Success:0` / `Error:0` acknowledgment
    pub async fn read_ack(&mut self) -> String {
        let first = self.read_exact(1).await;
        let len = if first[0] == b'S' { "Success:0".len() } else { "Error:0".len() };
        let rest = self.read_exact(len - 1).await;
        let mut ack = first;
        ack.extend(rest);
        String::from_utf8(ack).unwrap()
    }

    /// Read one `Model:<n>\n` + payload result frame and decode it
    pub async fn read_model(&mut self) -> XmlDocument {
        let mut header = String::new();
        self.stream.read_line(&mut header).await.unwrap();
        let n: usize = header
            .trim()
            .strip_prefix("Model:")
            .unwrap_or_else(|| panic!("unexpected header {header:?}"))
            .parse()
            .unwrap();
        let payload = self.read_exact(n).await;
        let xml = gzip::decompress(&payload).unwrap();
        XmlDocument::parse(xml.as_slice()).unwrap()
    }

    /// Whether nothing arrives within `wait`
    pub async fn is_silent(&mut self, wait: Duration) -> bool {
        let mut byte = [0u8; 1];
        tokio::time::timeout(wait, self.stream.read(&mut byte))
            .await
            .is_err()
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}
