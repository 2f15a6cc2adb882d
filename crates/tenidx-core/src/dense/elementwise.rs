//! Element-wise operations on tensors
//!
//! Unary maps, same-shape binary combinators and full reductions. These are
//! the value kernels behind the graph's elementwise nodes and the optimizer
//! arithmetic; anything that moves data between positions lives in
//! `reindex`.

use super::types::DenseND;
use crate::error::{Result, TenidxError};
use scirs2_core::ndarray_ext::Zip;
use scirs2_core::numeric::{Float, Num};

impl<T> DenseND<T>
where
    T: Clone + Num,
{
    /// Apply a function to every element.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenidx_core::DenseND;
    ///
    /// let tensor = DenseND::<f64>::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
    /// let doubled = tensor.map(|x| x * 2.0);
    /// assert_eq!(doubled.to_vec(), vec![2.0, 4.0, 6.0]);
    /// ```
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(T) -> T,
    {
        Self::from_array(self.data.mapv(f))
    }

    /// Combine two tensors of identical shape element by element.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the shapes differ. No broadcasting happens here.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenidx_core::DenseND;
    ///
    /// let a = DenseND::<f64>::from_vec(vec![1.0, 2.0], &[2]).unwrap();
    /// let b = DenseND::<f64>::from_vec(vec![10.0, 20.0], &[2]).unwrap();
    /// let c = a.zip_with(&b, |x, y| x + y).unwrap();
    /// assert_eq!(c.to_vec(), vec![11.0, 22.0]);
    /// ```
    pub fn zip_with<F>(&self, other: &Self, f: F) -> Result<Self>
    where
        F: Fn(T, T) -> T,
    {
        if self.shape() != other.shape() {
            return Err(TenidxError::shape_mismatch(
                "elementwise",
                vec![self.shape_vec(), other.shape_vec()],
            ));
        }
        let data = Zip::from(&self.data)
            .and(&other.data)
            .map_collect(|a, b| f(a.clone(), b.clone()));
        Ok(Self::from_array(data))
    }

    /// Element-wise addition
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Element-wise subtraction
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Element-wise multiplication
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Element-wise division
    pub fn div(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a / b)
    }

    /// Multiply every element by a constant
    pub fn scale(&self, factor: T) -> Self {
        self.map(|x| x * factor.clone())
    }

    /// Sum of all elements
    ///
    /// # Examples
    ///
    /// ```
    /// use tenidx_core::DenseND;
    ///
    /// let tensor = DenseND::<f64>::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    /// assert_eq!(tensor.sum(), 10.0);
    /// ```
    pub fn sum(&self) -> T {
        self.data
            .iter()
            .fold(T::zero(), |acc, x| acc + x.clone())
    }
}

impl<T> DenseND<T>
where
    T: Float,
{
    /// Element-wise square root
    pub fn sqrt(&self) -> Self {
        self.map(|x| x.sqrt())
    }

    /// Largest element, `-inf` for an empty tensor
    pub fn max_value(&self) -> T {
        self.data
            .iter()
            .fold(T::neg_infinity(), |acc, &x| acc.max(x))
    }

    /// Check every element against `other` within an absolute tolerance
    pub fn all_close(&self, other: &Self, tol: T) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(&a, &b)| a == b || (a - b).abs() <= tol)
    }
}
