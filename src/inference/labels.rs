use crate::config::ModelConfig;

/// Sentinel reported when no gesture passes the confidence gate.
pub const NO_MOTION_LABEL: &str = "No recognized motion";

/// Ordered gesture names; model output index `i` maps to `names[i]`.
///
/// Some model revisions add an explicit "no move" class. When configured,
/// predicting that class is reported the same way as a gated-out result.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    names: Vec<String>,
    no_move_index: Option<usize>,
    sentinel: String,
}

impl LabelSet {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            no_move_index: None,
            sentinel: NO_MOTION_LABEL.to_string(),
        }
    }

    /// Mark `label` as the model's explicit "no move" class.
    ///
    /// Returns `None` if the label is not part of the set.
    pub fn with_no_move_class(mut self, label: &str) -> Option<Self> {
        self.no_move_index = Some(self.names.iter().position(|n| n == label)?);
        Some(self)
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        let set = Self::new(config.labels.clone()).with_sentinel(config.no_motion_label.clone());
        match config.no_move_label.as_deref() {
            // validate() guarantees the label is present
            Some(label) => set.clone().with_no_move_class(label).unwrap_or(set),
            None => set,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn is_no_move(&self, index: usize) -> bool {
        self.no_move_index == Some(index)
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }
}

/// The 16 gestures of the reference model.
pub fn default_gestures() -> Vec<String> {
    [
        "circle_cw",
        "circle_ccw",
        "swipe_left",
        "swipe_right",
        "swipe_up",
        "swipe_down",
        "push",
        "pull",
        "shake",
        "tap",
        "twist_left",
        "twist_right",
        "figure_eight",
        "zigzag",
        "check",
        "cross",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
