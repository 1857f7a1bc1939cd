//! Copying between ndarray buffers and OpenVINO tensors

use anyhow::{Context, Result};
use ndarray::Array4;
use openvino::{ElementType, Shape, Tensor};

/// Build an f32 NCHW input tensor holding the contents of `array`
pub fn input_tensor(array: &Array4<f32>) -> Result<Tensor> {
    let dims: Vec<i64> = array.shape().iter().map(|&d| d as i64).collect();
    let shape = Shape::new(&dims)?;
    let mut tensor = Tensor::new(ElementType::F32, &shape)?;

    let data = array
        .as_slice()
        .context("input array is not in standard layout")?;
    let raw = tensor.get_raw_data_mut()?;
    anyhow::ensure!(
        raw.len() == std::mem::size_of_val(data),
        "tensor holds {} bytes, input has {}",
        raw.len(),
        std::mem::size_of_val(data)
    );

    // SAFETY: lengths checked above, and f32 has no invalid bit patterns
    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), raw.as_mut_ptr() as *mut f32, data.len());
    }

    Ok(tensor)
}

/// Read an f32 output tensor into a flat vector
pub fn read_f32(tensor: &Tensor) -> Result<Vec<f32>> {
    let shape = tensor.get_shape()?;
    let total: i64 = shape.get_dimensions().iter().product();
    let total = usize::try_from(total).context("negative tensor size")?;

    let raw = tensor.get_raw_data()?;
    anyhow::ensure!(
        raw.len() >= total * std::mem::size_of::<f32>(),
        "tensor buffer shorter than its shape"
    );

    let data = unsafe { std::slice::from_raw_parts(raw.as_ptr() as *const f32, total).to_vec() };
    Ok(data)
}
