use anyhow::{Result, ensure};
use opencv::core::CV_32F;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};

/// An owned 2d f32 array that can round-trip through `Mat` and serde
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Matrix2D {
    cols: usize,
    data: Vec<f32>,
}

impl Matrix2D {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> usize {
        if self.cols == 0 { 0 } else { self.data.len() / self.cols }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get specific row
    pub fn row(&self, n: usize) -> &[f32] {
        &self.data[n * self.cols..(n + 1) * self.cols]
    }

    pub fn push_row(&mut self, v: &[f32]) -> Result<()> {
        if self.cols == 0 {
            self.cols = v.len();
        }
        ensure!(self.cols == v.len(), "row width mismatch: {} != {}", v.len(), self.cols);
        self.data.extend_from_slice(v);
        Ok(())
    }

    /// Append all rows of a continuous CV_32F `Mat`. Empty mats are a no-op.
    pub fn push_mat(&mut self, mat: &Mat) -> Result<usize> {
        if mat.rows() == 0 {
            return Ok(0);
        }
        ensure!(mat.typ() == CV_32F, "expected CV_32F descriptors, got type {}", mat.typ());
        ensure!(mat.is_continuous(), "expected continuous matrix");
        if self.cols == 0 {
            self.cols = mat.cols() as usize;
        }
        ensure!(
            self.cols == mat.cols() as usize,
            "descriptor width mismatch: {} != {}",
            mat.cols(),
            self.cols
        );
        self.data.extend_from_slice(mat.data_typed::<f32>()?);
        Ok(mat.rows() as usize)
    }

    pub fn from_mat(mat: &Mat) -> Result<Self> {
        let mut m = Self::new();
        m.push_mat(mat)?;
        Ok(m)
    }

    pub fn to_mat(&self) -> Result<Mat> {
        if self.data.is_empty() {
            return Ok(Mat::default());
        }
        let mat = Mat::from_slice(&self.data)?;
        Ok(mat.reshape(1, self.rows() as i32)?.try_clone()?)
    }
}

#[cfg(test)]
mod tests {
    use super::Matrix2D;
    use opencv::prelude::*;

    #[test]
    fn push_and_index_rows() {
        let mut m = Matrix2D::new();
        m.push_row(&[1., 2.]).unwrap();
        m.push_row(&[3., 4.]).unwrap();

        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 2);
        assert_eq!(m.row(0), &[1., 2.]);
        assert_eq!(m.row(1), &[3., 4.]);
        assert!(m.push_row(&[5., 6., 7.]).is_err());
    }

    #[test]
    fn mat_round_trip() {
        let mat = Mat::from_slice_2d(&[[1f32, 2.], [3., 4.], [5., 6.]]).unwrap();
        let m = Matrix2D::from_mat(&mat).unwrap();
        assert_eq!(m.rows(), 3);
        assert_eq!(m.row(2), &[5., 6.]);

        let back = m.to_mat().unwrap();
        assert_eq!(back.rows(), 3);
        assert_eq!(back.cols(), 2);
        assert_eq!(*back.at_2d::<f32>(1, 0).unwrap(), 3.);
    }

    #[test]
    fn empty_matrix() {
        let m = Matrix2D::new();
        assert_eq!(m.rows(), 0);
        assert!(m.to_mat().unwrap().empty());

        let mut m = Matrix2D::new();
        assert_eq!(m.push_mat(&Mat::default()).unwrap(), 0);
        assert!(m.is_empty());
    }
}
