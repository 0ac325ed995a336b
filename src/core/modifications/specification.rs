//! 修改规格
//!
//! 闭合的修改类型：基础修改、顺序组合、恒等。组合名用 `__` 连接。

use image::RgbImage;

use crate::core::modifications::primitives::Primitive;

#[derive(Debug, Clone)]
pub enum Modification {
    Primitive(Primitive),
    /// 先 first 后 second
    Chain {
        first: Box<Modification>,
        second: Box<Modification>,
    },
    Identity,
}

impl Modification {
    pub fn name(&self) -> String {
        match self {
            Modification::Primitive(primitive) => primitive.name(),
            Modification::Chain { first, second } => {
                format!("{}__{}", first.name(), second.name())
            }
            Modification::Identity => "identity".to_string(),
        }
    }

    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        match self {
            Modification::Primitive(primitive) => primitive.apply(image),
            Modification::Chain { first, second } => second.apply(&first.apply(image)),
            Modification::Identity => image.clone(),
        }
    }

    /// 顺序组合两个修改
    pub fn and(self, other: Modification) -> Modification {
        Modification::Chain {
            first: Box::new(self),
            second: Box::new(other),
        }
    }

    /// 从列表左到右折叠成一条链，空列表退化为恒等
    pub fn compose(modifications: Vec<Modification>) -> Modification {
        let mut iter = modifications.into_iter();
        match iter.next() {
            None => Modification::Identity,
            Some(head) => iter.fold(head, Modification::and),
        }
    }
}
