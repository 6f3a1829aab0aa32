//! Classifier capability and the on-disk model artifact.
//!
//! The pipeline only needs `predict(tensor) -> scores`; everything else about
//! the classifier stays behind the [`Model`] trait so tests can plug in
//! deterministic stubs.
//!
//! The bundled artifact format is a JSON graph describing a small sequential
//! network plus a separate little-endian f32 weights blob. For every dense
//! layer the blob holds the `inputs x units` kernel (row-major) followed by
//! `units` biases, in layer order.

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;

use crate::error::{InferenceError, ModelLoadError};
use crate::types::sample::{Sample, CHANNELS};
use crate::types::CancelToken;

pub const GRAPH_FORMAT: &str = "gesturehub-sequential";

/// Rank-3 model input, shape `[1, steps, 6]`, channel order `ax..gz`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    shape: [usize; 3],
    data: Vec<f32>,
}

impl InputTensor {
    pub fn from_sequence(sequence: &[Sample]) -> Self {
        let data = sequence.iter().flat_map(|s| s.channels()).collect();
        Self {
            shape: [1, sequence.len(), CHANNELS],
            data,
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Opaque classifier: fixed-shape tensor in, one score per label out.
pub trait Model: Send {
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Softmax,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Flatten,
    GlobalAveragePool,
    Dense {
        units: usize,
        #[serde(default)]
        activation: Activation,
    },
}

/// JSON model graph.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelGraph {
    pub format: String,
    pub input_shape: [usize; 3],
    pub layers: Vec<LayerSpec>,
}

#[derive(Debug, Clone)]
enum Layer {
    Flatten,
    GlobalAveragePool {
        steps: usize,
        channels: usize,
    },
    Dense {
        inputs: usize,
        units: usize,
        kernel: Vec<f32>,
        bias: Vec<f32>,
        activation: Activation,
    },
}

#[derive(Debug, Clone, Copy)]
enum Dims {
    Sequence { steps: usize, channels: usize },
    Flat(usize),
}

/// Sequential network built from a [`ModelGraph`] and its weights.
#[derive(Debug, Clone)]
pub struct SequentialModel {
    input_shape: [usize; 3],
    layers: Vec<Layer>,
    outputs: usize,
}

impl SequentialModel {
    /// Load graph and weights from disk. Checks `cancel` between the stages.
    pub fn load(
        graph_path: &Path,
        weights_path: &Path,
        cancel: &CancelToken,
    ) -> Result<Self, ModelLoadError> {
        let graph_text = fs::read_to_string(graph_path).map_err(|source| ModelLoadError::Io {
            path: graph_path.to_path_buf(),
            source,
        })?;
        let graph: ModelGraph = serde_json::from_str(&graph_text)?;
        debug!("Parsed model graph with {} layers", graph.layers.len());

        if cancel.is_cancelled() {
            return Err(ModelLoadError::Cancelled);
        }

        let blob = fs::read(weights_path).map_err(|source| ModelLoadError::Io {
            path: weights_path.to_path_buf(),
            source,
        })?;
        if blob.len() % 4 != 0 {
            return Err(ModelLoadError::UnsupportedFormat(format!(
                "weights blob length {} is not a multiple of 4",
                blob.len()
            )));
        }
        let weights: Vec<f32> = blob
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        if cancel.is_cancelled() {
            return Err(ModelLoadError::Cancelled);
        }

        let model = Self::from_parts(&graph, &weights)?;
        info!(
            "Model loaded from {}: input {:?}, {} outputs",
            graph_path.display(),
            model.input_shape,
            model.outputs
        );
        Ok(model)
    }

    pub fn from_parts(graph: &ModelGraph, weights: &[f32]) -> Result<Self, ModelLoadError> {
        if graph.format != GRAPH_FORMAT {
            return Err(ModelLoadError::UnsupportedFormat(format!(
                "unknown graph format '{}'",
                graph.format
            )));
        }
        let [batch, steps, channels] = graph.input_shape;
        if batch != 1 || steps == 0 || channels != CHANNELS {
            return Err(ModelLoadError::UnsupportedFormat(format!(
                "input shape {:?} is not [1, T, {}]",
                graph.input_shape, CHANNELS
            )));
        }

        let expected = Self::parameter_count(graph)?;
        if expected != weights.len() {
            return Err(ModelLoadError::WeightsMismatch {
                expected,
                actual: weights.len(),
            });
        }

        let mut dims = Dims::Sequence { steps, channels };
        let mut offset = 0;
        let mut layers = Vec::with_capacity(graph.layers.len());
        for spec in &graph.layers {
            let (layer, next) = match (spec, dims) {
                (LayerSpec::Flatten, Dims::Sequence { steps, channels }) => {
                    (Layer::Flatten, Dims::Flat(steps * channels))
                }
                (LayerSpec::GlobalAveragePool, Dims::Sequence { steps, channels }) => {
                    (Layer::GlobalAveragePool { steps, channels }, Dims::Flat(channels))
                }
                (LayerSpec::Dense { units, activation }, Dims::Flat(inputs)) => {
                    let kernel = weights[offset..offset + inputs * units].to_vec();
                    offset += inputs * units;
                    let bias = weights[offset..offset + units].to_vec();
                    offset += units;
                    (
                        Layer::Dense {
                            inputs,
                            units: *units,
                            kernel,
                            bias,
                            activation: *activation,
                        },
                        Dims::Flat(*units),
                    )
                }
                // parameter_count already rejected every other combination
                _ => return Err(layer_mismatch(spec)),
            };
            layers.push(layer);
            dims = next;
        }

        let outputs = match dims {
            Dims::Flat(n) => n,
            Dims::Sequence { .. } => {
                return Err(ModelLoadError::UnsupportedFormat(
                    "graph must end in a flat output".to_string(),
                ))
            }
        };

        Ok(Self {
            input_shape: graph.input_shape,
            layers,
            outputs,
        })
    }

    /// Number of floats the weights blob must hold for `graph`.
    pub fn parameter_count(graph: &ModelGraph) -> Result<usize, ModelLoadError> {
        let [_, steps, channels] = graph.input_shape;
        let mut dims = Dims::Sequence { steps, channels };
        let mut count = 0;
        for spec in &graph.layers {
            dims = match (spec, dims) {
                (LayerSpec::Flatten, Dims::Sequence { steps, channels }) => Dims::Flat(steps * channels),
                (LayerSpec::GlobalAveragePool, Dims::Sequence { channels, .. }) => Dims::Flat(channels),
                (LayerSpec::Dense { units, .. }, Dims::Flat(inputs)) => {
                    count += inputs * units + units;
                    Dims::Flat(*units)
                }
                _ => return Err(layer_mismatch(spec)),
            };
        }
        Ok(count)
    }

    pub fn input_shape(&self) -> [usize; 3] {
        self.input_shape
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }
}

fn layer_mismatch(spec: &LayerSpec) -> ModelLoadError {
    ModelLoadError::UnsupportedFormat(format!("layer {:?} does not fit the previous output", spec))
}

impl Model for SequentialModel {
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        if input.shape() != self.input_shape {
            return Err(InferenceError::InputShape {
                expected: self.input_shape,
                actual: input.shape(),
            });
        }

        let mut values = input.data().to_vec();
        for layer in &self.layers {
            values = match layer {
                Layer::Flatten => values,
                Layer::GlobalAveragePool { steps, channels } => {
                    let mut pooled = vec![0f32; *channels];
                    for row in values.chunks_exact(*channels) {
                        for (acc, v) in pooled.iter_mut().zip(row) {
                            *acc += v;
                        }
                    }
                    pooled.iter_mut().for_each(|v| *v /= *steps as f32);
                    pooled
                }
                Layer::Dense {
                    inputs,
                    units,
                    kernel,
                    bias,
                    activation,
                } => {
                    let mut out = bias.clone();
                    for (i, x) in values.iter().enumerate().take(*inputs) {
                        let row = &kernel[i * units..(i + 1) * units];
                        for (o, w) in out.iter_mut().zip(row) {
                            *o += x * w;
                        }
                    }
                    match activation {
                        Activation::Linear => {}
                        Activation::Relu => out.iter_mut().for_each(|v| *v = v.max(0.0)),
                        Activation::Softmax => out = super::pipeline::softmax(&out),
                    }
                    out
                }
            };
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pooled_graph(units: usize) -> ModelGraph {
        ModelGraph {
            format: GRAPH_FORMAT.to_string(),
            input_shape: [1, 4, CHANNELS],
            layers: vec![
                LayerSpec::GlobalAveragePool,
                LayerSpec::Dense {
                    units,
                    activation: Activation::Linear,
                },
            ],
        }
    }

    #[test]
    fn graph_json_parses() {
        let json = r#"{
            "format": "gesturehub-sequential",
            "input_shape": [1, 180, 6],
            "layers": [
                {"type": "flatten"},
                {"type": "dense", "units": 8, "activation": "relu"},
                {"type": "dense", "units": 16, "activation": "softmax"}
            ]
        }"#;
        let graph: ModelGraph = serde_json::from_str(json).unwrap();
        assert_eq!(graph.layers.len(), 3);
        assert_eq!(
            SequentialModel::parameter_count(&graph).unwrap(),
            180 * 6 * 8 + 8 + 8 * 16 + 16
        );
    }

    #[test]
    fn weights_count_is_checked() {
        let err = SequentialModel::from_parts(&pooled_graph(2), &[0.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            ModelLoadError::WeightsMismatch { expected: 14, actual: 3 }
        ));
    }

    #[test]
    fn dense_after_sequence_is_rejected() {
        let graph = ModelGraph {
            format: GRAPH_FORMAT.to_string(),
            input_shape: [1, 4, CHANNELS],
            layers: vec![LayerSpec::Dense {
                units: 2,
                activation: Activation::Linear,
            }],
        };
        assert!(matches!(
            SequentialModel::parameter_count(&graph),
            Err(ModelLoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn pooled_dense_forward_pass() {
        // kernel picks ax for output 0 and gz for output 1
        let mut weights = vec![0f32; CHANNELS * 2 + 2];
        weights[0] = 1.0; // ax -> 0
        weights[5 * 2 + 1] = 1.0; // gz -> 1
        weights[CHANNELS * 2 + 1] = 0.5; // bias of output 1
        let model = SequentialModel::from_parts(&pooled_graph(2), &weights).unwrap();

        let seq: Vec<Sample> = (0..4)
            .map(|i| Sample::new(i as f32, 0.0, 0.0, 0.0, 0.0, 2.0))
            .collect();
        let out = model.predict(&InputTensor::from_sequence(&seq)).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0] - 1.5).abs() < 1e-6);
        assert!((out[1] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn wrong_input_shape_is_an_inference_error() {
        let model =
            SequentialModel::from_parts(&pooled_graph(2), &vec![0f32; CHANNELS * 2 + 2]).unwrap();
        let seq = vec![Sample::zero(); 5];
        assert!(matches!(
            model.predict(&InputTensor::from_sequence(&seq)),
            Err(InferenceError::InputShape { .. })
        ));
    }

    /// Graph JSON and weights blob for `pooled_graph(2)` under the temp dir.
    fn write_artifact(name: &str, weights: &[f32]) -> (std::path::PathBuf, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("gesturehub_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let graph_path = dir.join("model.json");
        let weights_path = dir.join("weights.bin");
        let graph = r#"{
            "format": "gesturehub-sequential",
            "input_shape": [1, 4, 6],
            "layers": [
                {"type": "global_average_pool"},
                {"type": "dense", "units": 2}
            ]
        }"#;
        fs::write(&graph_path, graph).unwrap();
        let blob: Vec<u8> = weights.iter().flat_map(|w| w.to_le_bytes()).collect();
        fs::write(&weights_path, blob).unwrap();
        (graph_path, weights_path)
    }

    #[test]
    fn load_reads_graph_and_weights_from_disk() {
        let mut weights = vec![0f32; CHANNELS * 2 + 2];
        weights[0] = 1.0;
        weights[CHANNELS * 2] = -1.0;
        let (graph_path, weights_path) = write_artifact("load", &weights);

        let model = SequentialModel::load(&graph_path, &weights_path, &CancelToken::new()).unwrap();
        assert_eq!(model.input_shape(), [1, 4, CHANNELS]);
        assert_eq!(model.outputs(), 2);

        let seq = vec![Sample::new(3.0, 0.0, 0.0, 0.0, 0.0, 0.0); 4];
        let out = model.predict(&InputTensor::from_sequence(&seq)).unwrap();
        assert!((out[0] - 2.0).abs() < 1e-6);
        assert!(out[1].abs() < 1e-6);
    }

    #[test]
    fn cancelled_token_stops_load() {
        let (graph_path, weights_path) = write_artifact("cancel", &[0f32; CHANNELS * 2 + 2]);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            SequentialModel::load(&graph_path, &weights_path, &cancel),
            Err(ModelLoadError::Cancelled)
        ));
    }

    #[test]
    fn missing_weights_file_is_io_error() {
        let (graph_path, _) = write_artifact("missing", &[]);
        let absent = graph_path.with_file_name("absent.bin");
        assert!(matches!(
            SequentialModel::load(&graph_path, &absent, &CancelToken::new()),
            Err(ModelLoadError::Io { .. })
        ));
    }

    #[test]
    fn tensor_layout_is_row_major_by_sample() {
        let seq = vec![
            Sample::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0),
            Sample::new(7.0, 8.0, 9.0, 10.0, 11.0, 12.0),
        ];
        let t = InputTensor::from_sequence(&seq);
        assert_eq!(t.shape(), [1, 2, 6]);
        assert_eq!(t.data()[6], 7.0);
        assert_eq!(t.data()[11], 12.0);
    }
}
