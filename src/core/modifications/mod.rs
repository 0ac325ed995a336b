//! 帧修改
//!
//! 配置文档里的名字经注册表换成基础修改，再按链组合成顺序应用的修改规格。

pub mod colorspace;
pub mod primitives;
pub mod register;
pub mod specification;

pub use primitives::Primitive;
pub use register::{default_register, BuildFn, ModificationRegister};
pub use specification::Modification;
