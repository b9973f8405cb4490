use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use lumen_coords::{element_count, position_to_raster};

use crate::{
	Buffer, Dataset, DatasetError, DatasetRef, DatasetWeak, Metadata, SampleType,
};

/// A leaf dataset: every axis is backed by one contiguous raster-ordered
/// buffer, so sample access is a single mixed-radix translation away.
pub struct ArrayDataset {
	dimensions: Vec<usize>,
	sample_type: SampleType,
	data: Option<Buffer>,
	parent: Option<DatasetWeak>,
	metadata: Metadata,
}

impl ArrayDataset {
	/// Creates a zero-filled dataset of the given extents.
	pub fn zeros(dimensions: &[usize], sample_type: SampleType) -> DatasetRef {
		let len = element_count(dimensions) as usize;
		Rc::new(RefCell::new(ArrayDataset {
			dimensions: dimensions.to_vec(),
			sample_type,
			data: Some(Buffer::zeros(sample_type, len)),
			parent: None,
			metadata: Metadata::default(),
		}))
	}

	/// Wraps an existing buffer, whose length must match the extents.
	pub fn from_buffer(dimensions: &[usize], data: Buffer) -> Result<DatasetRef, DatasetError> {
		if data.len() as u64 != element_count(dimensions) {
			return Err(DatasetError::InvalidArgument(format!(
				"buffer of {} samples cannot back dimensions {:?}",
				data.len(),
				dimensions
			)));
		}
		Ok(Rc::new(RefCell::new(ArrayDataset {
			dimensions: dimensions.to_vec(),
			sample_type: data.sample_type(),
			data: Some(data),
			parent: None,
			metadata: Metadata::default(),
		})))
	}

	fn raster(&self, position: &[usize]) -> Result<usize, DatasetError> {
		Ok(position_to_raster(&self.dimensions, position)? as usize)
	}

	fn buffer(&self) -> Result<&Buffer, DatasetError> {
		self.data
			.as_ref()
			.ok_or_else(|| DatasetError::IllegalState("sample data has been released".to_owned()))
	}

	fn buffer_mut(&mut self) -> Result<&mut Buffer, DatasetError> {
		self.data
			.as_mut()
			.ok_or_else(|| DatasetError::IllegalState("sample data has been released".to_owned()))
	}
}

impl Dataset for ArrayDataset {
	fn dimensions(&self) -> &[usize] {
		&self.dimensions
	}

	fn sample_type(&self) -> SampleType {
		self.sample_type
	}

	fn is_composite(&self) -> bool {
		false
	}

	fn real(&self, position: &[usize]) -> Result<f64, DatasetError> {
		let raster = self.raster(position)?;
		Ok(self.buffer()?.real(raster))
	}

	fn set_real(&mut self, position: &[usize], value: f64) -> Result<(), DatasetError> {
		let raster = self.raster(position)?;
		self.buffer_mut()?.set_real(raster, value);
		Ok(())
	}

	fn integer(&self, position: &[usize]) -> Result<i64, DatasetError> {
		let raster = self.raster(position)?;
		Ok(self.buffer()?.integer(raster))
	}

	fn set_integer(&mut self, position: &[usize], value: i64) -> Result<(), DatasetError> {
		let raster = self.raster(position)?;
		self.buffer_mut()?.set_integer(raster, value);
		Ok(())
	}

	fn subset(&self, _axis_value: usize) -> Result<DatasetRef, DatasetError> {
		Err(DatasetError::UnsupportedOperation(
			"subset of a planar dataset".to_owned(),
		))
	}

	fn subset_at(&self, _partial: &[usize]) -> Result<DatasetRef, DatasetError> {
		Err(DatasetError::UnsupportedOperation(
			"subset of a planar dataset".to_owned(),
		))
	}

	fn insert_new_subset(&mut self, _position: usize) -> Result<DatasetRef, DatasetError> {
		Err(DatasetError::UnsupportedOperation(
			"insert subset into a planar dataset".to_owned(),
		))
	}

	fn remove_subset(&mut self, _position: usize) -> Result<DatasetRef, DatasetError> {
		Err(DatasetError::UnsupportedOperation(
			"remove subset from a planar dataset".to_owned(),
		))
	}

	fn parent(&self) -> Option<DatasetRef> {
		self.parent.as_ref().and_then(|parent| parent.upgrade())
	}

	fn set_parent(&mut self, parent: Option<DatasetWeak>) {
		self.parent = parent;
	}

	fn metadata(&self) -> &Metadata {
		&self.metadata
	}

	fn set_metadata(&mut self, metadata: Metadata) {
		self.metadata = metadata;
	}

	fn addressable_axes(&self) -> usize {
		self.dimensions.len()
	}

	fn data(&self) -> Result<&Buffer, DatasetError> {
		self.buffer()
	}

	fn set_data(&mut self, data: Buffer) -> Result<(), DatasetError> {
		if data.len() as u64 != element_count(&self.dimensions) {
			return Err(DatasetError::InvalidArgument(format!(
				"buffer of {} samples cannot back dimensions {:?}",
				data.len(),
				self.dimensions
			)));
		}
		self.sample_type = data.sample_type();
		self.data = Some(data);
		Ok(())
	}

	fn release_data(&mut self) {
		self.data = None;
	}
}

impl fmt::Debug for ArrayDataset {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ArrayDataset")
			.field("dimensions", &self.dimensions)
			.field("sample_type", &self.sample_type)
			.field("released", &self.data.is_none())
			.finish()
	}
}
