pub mod classifier;
#[cfg(feature = "ml")]
pub mod ml_model;
#[cfg(feature = "ml")]
pub mod inference;
#[cfg(feature = "ml")]
pub mod export;

pub use classifier::{Classifier, ClassifierSlot};
#[cfg(feature = "ml")]
pub use ml_model::{PubClassifier, ModelConfig, NUM_CLASSES, CLASS_NAMES, MIN_IMAGE_SIZE};
#[cfg(feature = "ml")]
pub use inference::{InferenceEngine, load_classifier};
#[cfg(feature = "ml")]
pub use export::{write_model_archive, init_model_archive};
