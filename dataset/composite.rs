use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::{
	check_position_rank, ArrayDataset, Buffer, Dataset, DatasetError, DatasetRef, DatasetWeak,
	Metadata, SampleType,
};

/// A dataset whose outermost axis is backed by an ordered sequence of child
/// datasets, one per coordinate along that axis, instead of a flat buffer.
/// Every access strips the outermost coordinate and recurses into the
/// addressed child until a leaf performs the storage access.
pub struct CompositeDataset {
	dimensions: Vec<usize>,
	sample_type: SampleType,
	subsets: Vec<DatasetRef>,
	self_weak: Option<DatasetWeak>,
	parent: Option<DatasetWeak>,
	metadata: Metadata,
}

impl CompositeDataset {
	/// Builds a composite from existing children, one per coordinate along
	/// the new outermost axis. The children must agree on dimensions and
	/// sample type; each child's parent is set to the new composite.
	pub fn new(children: Vec<DatasetRef>) -> Result<DatasetRef, DatasetError> {
		let first = children.first().ok_or_else(|| {
			DatasetError::InvalidArgument("composite dataset needs at least one child".to_owned())
		})?;
		let child_dimensions = first.borrow().dimensions().to_vec();
		let sample_type = first.borrow().sample_type();
		for child in &children {
			let child = child.borrow();
			if child.dimensions() != child_dimensions.as_slice() {
				return Err(DatasetError::InvalidArgument(format!(
					"child dimensions {:?} do not match {:?}",
					child.dimensions(),
					child_dimensions
				)));
			}
			if child.sample_type() != sample_type {
				return Err(DatasetError::InvalidArgument(format!(
					"child sample type {} does not match {}",
					child.sample_type(),
					sample_type
				)));
			}
		}
		let mut dimensions = child_dimensions;
		dimensions.push(children.len());
		Ok(Self::wire(CompositeDataset {
			dimensions,
			sample_type,
			subsets: children,
			self_weak: None,
			parent: None,
			metadata: Metadata::default(),
		}))
	}

	/// Builds a composite of the given extents backed by zero-filled planar
	/// children, one leaf per coordinate along the outermost axis.
	pub fn with_planes(
		dimensions: &[usize],
		sample_type: SampleType,
	) -> Result<DatasetRef, DatasetError> {
		let (&planes, child_dimensions) = dimensions.split_last().ok_or_else(|| {
			DatasetError::InvalidArgument(
				"composite dataset needs at least one axis".to_owned(),
			)
		})?;
		let subsets = (0..planes)
			.map(|_| ArrayDataset::zeros(child_dimensions, sample_type))
			.collect();
		Ok(Self::wire(CompositeDataset {
			dimensions: dimensions.to_vec(),
			sample_type,
			subsets,
			self_weak: None,
			parent: None,
			metadata: Metadata::default(),
		}))
	}

	fn wire(composite: CompositeDataset) -> DatasetRef {
		let rc = Rc::new(RefCell::new(composite));
		let handle: DatasetRef = rc.clone();
		let weak = Rc::downgrade(&handle);
		let mut guard = rc.borrow_mut();
		guard.self_weak = Some(weak.clone());
		for child in &guard.subsets {
			child.borrow_mut().set_parent(Some(weak.clone()));
		}
		drop(guard);
		handle
	}

	fn child(&self, index: usize) -> Result<&DatasetRef, DatasetError> {
		self.subsets.get(index).ok_or_else(|| {
			DatasetError::OutOfRange(format!(
				"subset {} out of range for outermost axis of size {}",
				index,
				self.subsets.len()
			))
		})
	}

	/// Only the outermost composite, the one with no parent, may grow or
	/// shrink along its outermost axis.
	fn check_outermost(&self) -> Result<(), DatasetError> {
		if self.parent().is_some() {
			return Err(DatasetError::IllegalState(
				"only the outermost composite may be restructured".to_owned(),
			));
		}
		Ok(())
	}
}

impl Dataset for CompositeDataset {
	fn dimensions(&self) -> &[usize] {
		&self.dimensions
	}

	fn sample_type(&self) -> SampleType {
		self.sample_type
	}

	fn is_composite(&self) -> bool {
		true
	}

	fn real(&self, position: &[usize]) -> Result<f64, DatasetError> {
		check_position_rank(position, self.dimensions.len())?;
		let (inner, index) = position.split_at(position.len() - 1);
		self.child(index[0])?.borrow().real(inner)
	}

	fn set_real(&mut self, position: &[usize], value: f64) -> Result<(), DatasetError> {
		check_position_rank(position, self.dimensions.len())?;
		let (inner, index) = position.split_at(position.len() - 1);
		self.child(index[0])?.borrow_mut().set_real(inner, value)
	}

	fn integer(&self, position: &[usize]) -> Result<i64, DatasetError> {
		check_position_rank(position, self.dimensions.len())?;
		let (inner, index) = position.split_at(position.len() - 1);
		self.child(index[0])?.borrow().integer(inner)
	}

	fn set_integer(&mut self, position: &[usize], value: i64) -> Result<(), DatasetError> {
		check_position_rank(position, self.dimensions.len())?;
		let (inner, index) = position.split_at(position.len() - 1);
		self.child(index[0])?.borrow_mut().set_integer(inner, value)
	}

	fn subset(&self, axis_value: usize) -> Result<DatasetRef, DatasetError> {
		Ok(self.child(axis_value)?.clone())
	}

	fn subset_at(&self, partial: &[usize]) -> Result<DatasetRef, DatasetError> {
		let (&index, rest) = partial.split_first().ok_or_else(|| {
			DatasetError::InvalidArgument("empty partial index".to_owned())
		})?;
		let child = self.child(index)?;
		if rest.is_empty() {
			Ok(child.clone())
		} else {
			child.borrow().subset_at(rest)
		}
	}

	fn insert_new_subset(&mut self, position: usize) -> Result<DatasetRef, DatasetError> {
		self.check_outermost()?;
		if position > self.subsets.len() {
			return Err(DatasetError::OutOfRange(format!(
				"insert position {} out of range for outermost axis of size {}",
				position,
				self.subsets.len()
			)));
		}
		let weak = self.self_weak.clone().ok_or_else(|| {
			DatasetError::IllegalState("detached composite dataset".to_owned())
		})?;
		let child_dimensions = &self.dimensions[..self.dimensions.len() - 1];
		let child = ArrayDataset::zeros(child_dimensions, self.sample_type);
		child.borrow_mut().set_parent(Some(weak));
		self.subsets.insert(position, child.clone());
		*self.dimensions.last_mut().unwrap() += 1;
		Ok(child)
	}

	fn remove_subset(&mut self, position: usize) -> Result<DatasetRef, DatasetError> {
		self.check_outermost()?;
		if position >= self.subsets.len() {
			return Err(DatasetError::OutOfRange(format!(
				"remove position {} out of range for outermost axis of size {}",
				position,
				self.subsets.len()
			)));
		}
		let child = self.subsets.remove(position);
		child.borrow_mut().set_parent(None);
		*self.dimensions.last_mut().unwrap() -= 1;
		Ok(child)
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
		self.subsets
			.first()
			.map(|child| child.borrow().addressable_axes())
			.unwrap_or(self.dimensions.len() - 1)
	}

	fn data(&self) -> Result<&Buffer, DatasetError> {
		Err(DatasetError::UnsupportedOperation(
			"composite dataset owns no contiguous buffer".to_owned(),
		))
	}

	fn set_data(&mut self, _data: Buffer) -> Result<(), DatasetError> {
		Err(DatasetError::UnsupportedOperation(
			"composite dataset owns no contiguous buffer".to_owned(),
		))
	}

	fn release_data(&mut self) {}
}

impl fmt::Debug for CompositeDataset {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CompositeDataset")
			.field("dimensions", &self.dimensions)
			.field("sample_type", &self.sample_type)
			.field("subsets", &self.subsets.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use lumen_coords::{element_count, raster_to_position};

	#[test]
	fn test_round_trip() {
		let dimensions = vec![4, 3, 2];
		let dataset = CompositeDataset::with_planes(&dimensions, SampleType::F64).unwrap();
		assert_eq!(dataset.borrow().dimensions(), &[4, 3, 2]);
		assert!(dataset.borrow().is_composite());
		for raster in 0..element_count(&dimensions) {
			let position = raster_to_position(&dimensions, raster).unwrap();
			dataset
				.borrow_mut()
				.set_real(&position, raster as f64)
				.unwrap();
		}
		for raster in 0..element_count(&dimensions) {
			let position = raster_to_position(&dimensions, raster).unwrap();
			assert_eq!(dataset.borrow().real(&position).unwrap(), raster as f64);
		}
	}

	#[test]
	fn test_children_are_parented() {
		let dataset = CompositeDataset::with_planes(&[2, 2, 3], SampleType::U8).unwrap();
		for axis_value in 0..3 {
			let child = dataset.borrow().subset(axis_value).unwrap();
			let parent = child.borrow().parent().unwrap();
			assert!(Rc::ptr_eq(&parent, &dataset));
		}
	}

	#[test]
	fn test_new_validates_children() {
		assert!(matches!(
			CompositeDataset::new(vec![]),
			Err(DatasetError::InvalidArgument(_))
		));
		let children = vec![
			ArrayDataset::zeros(&[2, 2], SampleType::U8),
			ArrayDataset::zeros(&[2, 3], SampleType::U8),
		];
		assert!(matches!(
			CompositeDataset::new(children),
			Err(DatasetError::InvalidArgument(_))
		));
		let children = vec![
			ArrayDataset::zeros(&[2, 2], SampleType::U8),
			ArrayDataset::zeros(&[2, 2], SampleType::I16),
		];
		assert!(matches!(
			CompositeDataset::new(children),
			Err(DatasetError::InvalidArgument(_))
		));
	}

	#[test]
	fn test_insert_remove_symmetry() {
		let dataset = CompositeDataset::with_planes(&[3, 2, 2], SampleType::F32).unwrap();
		let before: Vec<DatasetRef> = (0..2)
			.map(|axis_value| dataset.borrow().subset(axis_value).unwrap())
			.collect();

		let inserted = dataset.borrow_mut().insert_new_subset(1).unwrap();
		assert_eq!(dataset.borrow().dimensions(), &[3, 2, 3]);
		assert!(Rc::ptr_eq(
			&dataset.borrow().subset(1).unwrap(),
			&inserted
		));
		assert!(Rc::ptr_eq(
			&inserted.borrow().parent().unwrap(),
			&dataset
		));

		let removed = dataset.borrow_mut().remove_subset(1).unwrap();
		assert!(Rc::ptr_eq(&removed, &inserted));
		assert!(removed.borrow().parent().is_none());
		assert_eq!(dataset.borrow().dimensions(), &[3, 2, 2]);
		for (axis_value, child) in before.iter().enumerate() {
			assert!(Rc::ptr_eq(
				&dataset.borrow().subset(axis_value).unwrap(),
				child
			));
		}
	}

	#[test]
	fn test_only_outermost_composite_may_grow() {
		let children = (0..2)
			.map(|_| CompositeDataset::with_planes(&[2, 2], SampleType::U8).unwrap())
			.collect();
		let outer = CompositeDataset::new(children).unwrap();
		let inner = outer.borrow().subset(0).unwrap();
		assert!(matches!(
			inner.borrow_mut().insert_new_subset(0),
			Err(DatasetError::IllegalState(_))
		));
		assert!(matches!(
			inner.borrow_mut().remove_subset(0),
			Err(DatasetError::IllegalState(_))
		));
		assert!(outer.borrow_mut().insert_new_subset(2).is_ok());
		assert_eq!(outer.borrow().dimensions(), &[2, 2, 3]);
	}

	#[test]
	fn test_subset_at_descends_recursively() {
		let children = (0..2)
			.map(|_| CompositeDataset::with_planes(&[2, 3, 2], SampleType::F64).unwrap())
			.collect();
		let outer = CompositeDataset::new(children).unwrap();
		assert_eq!(outer.borrow().dimensions(), &[2, 3, 2, 2]);

		outer.borrow_mut().set_real(&[1, 2, 0, 1], 9.0).unwrap();
		let plane = outer.borrow().subset_at(&[1, 0]).unwrap();
		assert_eq!(plane.borrow().dimensions(), &[2, 3]);
		assert_eq!(plane.borrow().real(&[1, 2]).unwrap(), 9.0);

		assert!(matches!(
			outer.borrow().subset_at(&[]),
			Err(DatasetError::InvalidArgument(_))
		));
		assert!(matches!(
			outer.borrow().subset_at(&[2]),
			Err(DatasetError::OutOfRange(_))
		));
	}

	#[test]
	fn test_subset_writes_are_shared() {
		let dataset = CompositeDataset::with_planes(&[2, 2, 2], SampleType::I32).unwrap();
		let plane = dataset.borrow().subset(1).unwrap();
		plane.borrow_mut().set_integer(&[0, 1], 42).unwrap();
		assert_eq!(dataset.borrow().integer(&[0, 1, 1]).unwrap(), 42);
	}

	#[test]
	fn test_no_direct_buffer() {
		let dataset = CompositeDataset::with_planes(&[2, 2], SampleType::U8).unwrap();
		assert!(matches!(
			dataset.borrow().data(),
			Err(DatasetError::UnsupportedOperation(_))
		));
		assert!(matches!(
			dataset.borrow_mut().set_data(Buffer::zeros(SampleType::U8, 4)),
			Err(DatasetError::UnsupportedOperation(_))
		));
	}

	#[test]
	fn test_addressable_axes() {
		let dataset = CompositeDataset::with_planes(&[4, 3, 2], SampleType::F64).unwrap();
		assert_eq!(dataset.borrow().addressable_axes(), 2);
		let children = (0..2)
			.map(|_| CompositeDataset::with_planes(&[4, 3, 2], SampleType::F64).unwrap())
			.collect();
		let outer = CompositeDataset::new(children).unwrap();
		assert_eq!(outer.borrow().addressable_axes(), 2);
	}

	#[test]
	fn test_out_of_range_child() {
		let dataset = CompositeDataset::with_planes(&[2, 2], SampleType::U8).unwrap();
		assert!(matches!(
			dataset.borrow().real(&[0, 2]),
			Err(DatasetError::OutOfRange(_))
		));
		assert!(matches!(
			dataset.borrow().subset(2),
			Err(DatasetError::OutOfRange(_))
		));
	}
}
