/*!
This crate provides Lumen's dataset core: n-dimensional sample arrays whose storage need not be one contiguous buffer. A [`Dataset`] is the capability contract shared by three implementations: [`ArrayDataset`], a leaf owning a contiguous sample buffer, [`CompositeDataset`], whose outermost axis is backed by an ordered sequence of child datasets, and [`DatasetView`], which re-presents a subset of another dataset's axes with the rest pinned to fixed values. [`SynchronizedIterator`] drives several datasets through a shared region in lock-step.

Datasets are shared as [`DatasetRef`] handles. The model is single-threaded and synchronous: handles are `Rc<RefCell<_>>`, parents are non-owning `Weak` back-references, and callers serialize access.
*/

use num_traits::ToPrimitive;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;

use lumen_coords::CoordError;

pub mod composite;
pub mod planar;
pub mod sync_iter;
pub mod view;

pub use self::composite::*;
pub use self::planar::*;
pub use self::sync_iter::*;
pub use self::view::*;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error("out of range: {0}")]
	OutOfRange(String),
	#[error("illegal state: {0}")]
	IllegalState(String),
	#[error("unsupported operation: {0}")]
	UnsupportedOperation(String),
}

impl From<CoordError> for DatasetError {
	fn from(error: CoordError) -> Self {
		match error {
			CoordError::InvalidArgument(message) => DatasetError::InvalidArgument(message),
			CoordError::OutOfRange(message) => DatasetError::OutOfRange(message),
		}
	}
}

/// The logical encoding of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
	U8,
	I8,
	U16,
	I16,
	U32,
	I32,
	F32,
	F64,
}

impl SampleType {
	pub fn is_integral(self) -> bool {
		!matches!(self, SampleType::F32 | SampleType::F64)
	}

	pub fn bits(self) -> usize {
		match self {
			SampleType::U8 | SampleType::I8 => 8,
			SampleType::U16 | SampleType::I16 => 16,
			SampleType::U32 | SampleType::I32 | SampleType::F32 => 32,
			SampleType::F64 => 64,
		}
	}
}

impl fmt::Display for SampleType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SampleType::U8 => "u8",
			SampleType::I8 => "i8",
			SampleType::U16 => "u16",
			SampleType::I16 => "i16",
			SampleType::U32 => "u32",
			SampleType::I32 => "i32",
			SampleType::F32 => "f32",
			SampleType::F64 => "f64",
		};
		write!(f, "{}", name)
	}
}

/// A contiguous block of raster-ordered samples of one [`SampleType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
	U8(Vec<u8>),
	I8(Vec<i8>),
	U16(Vec<u16>),
	I16(Vec<i16>),
	U32(Vec<u32>),
	I32(Vec<i32>),
	F32(Vec<f32>),
	F64(Vec<f64>),
}

impl Buffer {
	pub fn zeros(sample_type: SampleType, len: usize) -> Self {
		match sample_type {
			SampleType::U8 => Buffer::U8(vec![0; len]),
			SampleType::I8 => Buffer::I8(vec![0; len]),
			SampleType::U16 => Buffer::U16(vec![0; len]),
			SampleType::I16 => Buffer::I16(vec![0; len]),
			SampleType::U32 => Buffer::U32(vec![0; len]),
			SampleType::I32 => Buffer::I32(vec![0; len]),
			SampleType::F32 => Buffer::F32(vec![0.0; len]),
			SampleType::F64 => Buffer::F64(vec![0.0; len]),
		}
	}

	pub fn sample_type(&self) -> SampleType {
		match self {
			Buffer::U8(_) => SampleType::U8,
			Buffer::I8(_) => SampleType::I8,
			Buffer::U16(_) => SampleType::U16,
			Buffer::I16(_) => SampleType::I16,
			Buffer::U32(_) => SampleType::U32,
			Buffer::I32(_) => SampleType::I32,
			Buffer::F32(_) => SampleType::F32,
			Buffer::F64(_) => SampleType::F64,
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Buffer::U8(data) => data.len(),
			Buffer::I8(data) => data.len(),
			Buffer::U16(data) => data.len(),
			Buffer::I16(data) => data.len(),
			Buffer::U32(data) => data.len(),
			Buffer::I32(data) => data.len(),
			Buffer::F32(data) => data.len(),
			Buffer::F64(data) => data.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn real(&self, index: usize) -> f64 {
		match self {
			Buffer::U8(data) => data[index].to_f64().unwrap(),
			Buffer::I8(data) => data[index].to_f64().unwrap(),
			Buffer::U16(data) => data[index].to_f64().unwrap(),
			Buffer::I16(data) => data[index].to_f64().unwrap(),
			Buffer::U32(data) => data[index].to_f64().unwrap(),
			Buffer::I32(data) => data[index].to_f64().unwrap(),
			Buffer::F32(data) => data[index].to_f64().unwrap(),
			Buffer::F64(data) => data[index],
		}
	}

	pub fn set_real(&mut self, index: usize, value: f64) {
		match self {
			Buffer::U8(data) => data[index] = value as u8,
			Buffer::I8(data) => data[index] = value as i8,
			Buffer::U16(data) => data[index] = value as u16,
			Buffer::I16(data) => data[index] = value as i16,
			Buffer::U32(data) => data[index] = value as u32,
			Buffer::I32(data) => data[index] = value as i32,
			Buffer::F32(data) => data[index] = value as f32,
			Buffer::F64(data) => data[index] = value,
		}
	}

	pub fn integer(&self, index: usize) -> i64 {
		match self {
			Buffer::U8(data) => data[index].to_i64().unwrap(),
			Buffer::I8(data) => data[index].to_i64().unwrap(),
			Buffer::U16(data) => data[index].to_i64().unwrap(),
			Buffer::I16(data) => data[index].to_i64().unwrap(),
			Buffer::U32(data) => data[index].to_i64().unwrap(),
			Buffer::I32(data) => data[index].to_i64().unwrap(),
			Buffer::F32(data) => data[index] as i64,
			Buffer::F64(data) => data[index] as i64,
		}
	}

	pub fn set_integer(&mut self, index: usize, value: i64) {
		match self {
			Buffer::U8(data) => data[index] = value as u8,
			Buffer::I8(data) => data[index] = value as i8,
			Buffer::U16(data) => data[index] = value as u16,
			Buffer::I16(data) => data[index] = value as i16,
			Buffer::U32(data) => data[index] = value as u32,
			Buffer::I32(data) => data[index] = value as i32,
			Buffer::F32(data) => data[index] = value as f32,
			Buffer::F64(data) => data[index] = value as f64,
		}
	}
}

/// Auxiliary descriptor carried by every dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
	pub name: String,
	pub axis_labels: Vec<String>,
}

/// A shared handle to a dataset.
pub type DatasetRef = Rc<RefCell<dyn Dataset>>;

/// A non-owning back-reference from a child dataset to its parent.
pub type DatasetWeak = Weak<RefCell<dyn Dataset>>;

/// The contract every array-like entity implements.
///
/// Positions are coordinate tuples with axis 0 fastest-varying; a position
/// must have exactly `dimensions().len()` axes (`InvalidArgument` otherwise)
/// and every component must be within its extent (`OutOfRange` otherwise).
pub trait Dataset: fmt::Debug {
	/// The per-axis extents.
	fn dimensions(&self) -> &[usize];

	fn sample_type(&self) -> SampleType;

	fn is_composite(&self) -> bool;

	fn real(&self, position: &[usize]) -> Result<f64, DatasetError>;

	fn set_real(&mut self, position: &[usize], value: f64) -> Result<(), DatasetError>;

	fn integer(&self, position: &[usize]) -> Result<i64, DatasetError>;

	fn set_integer(&mut self, position: &[usize], value: i64) -> Result<(), DatasetError>;

	/// The dataset obtained by fixing the outermost axis to `axis_value`.
	/// Fails with `UnsupportedOperation` on a leaf.
	fn subset(&self, axis_value: usize) -> Result<DatasetRef, DatasetError>;

	/// The dataset obtained by fixing the outermost `partial.len()` axes,
	/// `partial[0]` addressing the outermost axis. Fails with
	/// `UnsupportedOperation` on a leaf.
	fn subset_at(&self, partial: &[usize]) -> Result<DatasetRef, DatasetError>;

	/// Inserts a new zeroed hyperplane at `position` along the outermost
	/// axis and returns it. Legal only on a composite with no parent.
	fn insert_new_subset(&mut self, position: usize) -> Result<DatasetRef, DatasetError>;

	/// Removes and returns the hyperplane at `position` along the outermost
	/// axis. Legal only on a composite with no parent.
	fn remove_subset(&mut self, position: usize) -> Result<DatasetRef, DatasetError>;

	fn parent(&self) -> Option<DatasetRef>;

	fn set_parent(&mut self, parent: Option<DatasetWeak>);

	fn metadata(&self) -> &Metadata;

	fn set_metadata(&mut self, metadata: Metadata);

	/// The number of innermost axes backed by one contiguous,
	/// index-free-accessible block.
	fn addressable_axes(&self) -> usize;

	/// The raw buffer, when this dataset owns one directly.
	fn data(&self) -> Result<&Buffer, DatasetError>;

	/// Replaces the raw buffer. Fails with `UnsupportedOperation` when this
	/// dataset owns no storage of its own.
	fn set_data(&mut self, data: Buffer) -> Result<(), DatasetError>;

	/// Releases the raw buffer, if any. A no-op on composites and views.
	fn release_data(&mut self);
}

pub(crate) fn check_position_rank(position: &[usize], rank: usize) -> Result<(), DatasetError> {
	if position.len() != rank {
		return Err(DatasetError::InvalidArgument(format!(
			"position has {} axes but dataset has {}",
			position.len(),
			rank
		)));
	}
	Ok(())
}
