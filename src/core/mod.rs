//! 深伪检测数据集准备核心
//!
//! 流程：配置解析出修改链，帧分配引擎按份额指派并应用，
//! 人脸裁剪收束到模型输入尺寸，最后按类划分数据集。

pub mod dataset;
pub mod error;
pub mod faces;
pub mod generator;
pub mod modifications;
pub mod settings;

pub use dataset::{split_dataset, SplitRatios, FAKES_DIR, REALS_DIR};
pub use error::PrepError;
pub use faces::{
    select_face, FaceBox, FaceDetectionModel, FaceDetector, FaceExtractor, MockFaceDetector,
};
pub use generator::{ModificationGenerator, ModificationRange, ModificationShare, ModifiedFrame};
pub use modifications::{default_register, Modification, ModificationRegister, Primitive};
pub use settings::{ChainSettings, GeneratorSettings, ModificationSettings, OptionValue};
