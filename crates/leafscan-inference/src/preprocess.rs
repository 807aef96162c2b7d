//! Image preprocessing: decode, RGB conversion, resize, normalize, batch

use crate::config::InputSize;
use candle_core::{Device, Tensor};
use image::{imageops, imageops::FilterType, DynamicImage, RgbImage};
use leafscan_core::{Error, Result};

/// Number of color channels fed to the model
pub const CHANNELS: usize = 3;

/// Normalized single-image batch in NHWC layout, values in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    height: usize,
    width: usize,
}

impl ImageTensor {
    /// Scale an RGB image's bytes to [0, 1]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let data = image
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 255.0)
            .collect();

        Self {
            data,
            height: height as usize,
            width: width as usize,
        }
    }

    /// Build from raw NHWC values; the length must match the dimensions
    pub fn from_raw(data: Vec<f32>, height: usize, width: usize) -> Result<Self> {
        if data.len() != height * width * CHANNELS {
            return Err(Error::inference(format!(
                "tensor holds {} values, expected {}x{}x{}",
                data.len(),
                height,
                width,
                CHANNELS
            )));
        }
        Ok(Self { data, height, width })
    }

    /// `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        [1, self.height, self.width, CHANNELS]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Copy into a candle tensor on `device`
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Tensor::from_slice(&self.data, (1, self.height, self.width, CHANNELS), device)
            .map_err(|e| Error::inference(format!("Failed to build input tensor: {}", e)))
    }
}

/// Turns uploaded bytes into model input
#[derive(Debug, Clone)]
pub struct Preprocessor {
    input_size: InputSize,
    filter: FilterType,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(InputSize::default())
    }
}

impl Preprocessor {
    /// Bilinear resampling, matching the training pipeline
    pub fn new(input_size: InputSize) -> Self {
        Self {
            input_size,
            filter: FilterType::Triangle,
        }
    }

    pub fn input_size(&self) -> InputSize {
        self.input_size
    }

    /// Decode bytes in any supported raster format
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(Error::invalid_image("empty image buffer"));
        }
        image::load_from_memory(bytes)
            .map_err(|e| Error::invalid_image(format!("Invalid image format: {}", e)))
    }

    /// Full preprocessing chain for one image
    pub fn preprocess(&self, bytes: &[u8]) -> Result<ImageTensor> {
        let decoded = self.decode(bytes)?;
        Ok(self.prepare(&decoded))
    }

    /// RGB conversion, direct resize (aspect ratio not kept) and scaling.
    ///
    /// Pixels are reduced to 8-bit RGB before resampling.
    pub fn prepare(&self, image: &DynamicImage) -> ImageTensor {
        let InputSize { height, width } = self.input_size;
        let rgb = image.to_rgb8();
        let resized = imageops::resize(&rgb, width, height, self.filter);
        ImageTensor::from_rgb(&resized)
    }
}
