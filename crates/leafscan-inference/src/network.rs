//! Compact convolutional leaf classifier

use candle_core::{Module, Tensor};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Linear, VarBuilder};

const KERNEL_SIZE: usize = 3;
const POOL_SIZE: usize = 2;

/// Stack of conv blocks followed by global average pooling and a linear head.
///
/// Expects NCHW input. Weights are read from `features.{i}.weight|bias` and
/// `head.weight|bias`.
#[derive(Debug, Clone)]
pub struct LeafNet {
    blocks: Vec<Conv2d>,
    head: Linear,
}

impl LeafNet {
    pub fn load(
        vb: VarBuilder,
        in_channels: usize,
        channels: &[usize],
        num_classes: usize,
    ) -> candle_core::Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };

        let mut blocks = Vec::with_capacity(channels.len());
        let mut c_in = in_channels;
        for (i, &c_out) in channels.iter().enumerate() {
            blocks.push(conv2d(c_in, c_out, KERNEL_SIZE, cfg, vb.pp(format!("features.{i}")))?);
            c_in = c_out;
        }

        let head = linear(c_in, num_classes, vb.pp("head"))?;

        Ok(Self { blocks, head })
    }

    pub fn depth(&self) -> usize {
        self.blocks.len()
    }
}

impl Module for LeafNet {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut xs = xs.clone();
        for block in &self.blocks {
            xs = xs.apply(block)?.relu()?.max_pool2d(POOL_SIZE)?;
        }
        // global average pool over H and W
        let pooled = xs.mean((2, 3))?;
        pooled.apply(&self.head)
    }
}
