use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use itertools::izip;

use crate::{
	check_position_rank, Buffer, Dataset, DatasetError, DatasetRef, DatasetWeak, Metadata,
	SampleType,
};

/// A dataset that re-presents a subset of another dataset's axes, with the
/// remaining axes pinned to fixed values. A view owns no sample storage:
/// every access translates view coordinates into reference coordinates and
/// forwards to the reference dataset.
pub struct DatasetView {
	reference: DatasetRef,
	/// One entry per reference axis; `None` marks a free axis.
	fixed: Vec<Option<usize>>,
	/// Reference-axis indices of the free axes, innermost first.
	view_axes: Vec<usize>,
	dimensions: Vec<usize>,
	first_fixed_axis: Option<usize>,
	parent: Option<DatasetWeak>,
	metadata: Metadata,
}

impl DatasetView {
	/// Builds a view of `reference` with one `fixed` entry per reference
	/// axis. At least one axis must be free and every pinned value must lie
	/// within its axis.
	pub fn new(
		reference: DatasetRef,
		fixed: Vec<Option<usize>>,
	) -> Result<DatasetRef, DatasetError> {
		let reference_dimensions = reference.borrow().dimensions().to_vec();
		if fixed.len() != reference_dimensions.len() {
			return Err(DatasetError::InvalidArgument(format!(
				"view fixes {} axes but the reference has {}",
				fixed.len(),
				reference_dimensions.len()
			)));
		}
		for (axis, (fixed, dimension)) in izip!(&fixed, &reference_dimensions).enumerate() {
			if let Some(value) = fixed {
				if *value >= *dimension {
					return Err(DatasetError::OutOfRange(format!(
						"fixed value {} out of range for axis {} of size {}",
						value, axis, dimension
					)));
				}
			}
		}
		let view_axes: Vec<usize> = fixed
			.iter()
			.enumerate()
			.filter(|(_, fixed)| fixed.is_none())
			.map(|(axis, _)| axis)
			.collect();
		if view_axes.is_empty() {
			return Err(DatasetError::InvalidArgument(
				"view needs at least one free axis".to_owned(),
			));
		}
		let dimensions = view_axes
			.iter()
			.map(|axis| reference_dimensions[*axis])
			.collect();
		let first_fixed_axis = fixed.iter().position(|fixed| fixed.is_some());
		let metadata = {
			let reference = reference.borrow();
			let reference_metadata = reference.metadata();
			let axis_labels = if reference_metadata.axis_labels.len() == fixed.len() {
				view_axes
					.iter()
					.map(|axis| reference_metadata.axis_labels[*axis].clone())
					.collect()
			} else {
				Vec::new()
			};
			Metadata {
				name: reference_metadata.name.clone(),
				axis_labels,
			}
		};
		Ok(Rc::new(RefCell::new(DatasetView {
			reference,
			fixed,
			view_axes,
			dimensions,
			first_fixed_axis,
			parent: None,
			metadata,
		})))
	}

	/// Expands a view-space position into a full reference-space position:
	/// free axes take the view's values, fixed axes keep their pinned ones.
	fn full_position(&self, position: &[usize]) -> Result<Vec<usize>, DatasetError> {
		check_position_rank(position, self.dimensions.len())?;
		let mut full: Vec<usize> = self.fixed.iter().map(|fixed| fixed.unwrap_or(0)).collect();
		for (axis, value) in izip!(&self.view_axes, position) {
			full[*axis] = *value;
		}
		Ok(full)
	}
}

impl Dataset for DatasetView {
	fn dimensions(&self) -> &[usize] {
		&self.dimensions
	}

	fn sample_type(&self) -> SampleType {
		self.reference.borrow().sample_type()
	}

	fn is_composite(&self) -> bool {
		false
	}

	fn real(&self, position: &[usize]) -> Result<f64, DatasetError> {
		let full = self.full_position(position)?;
		self.reference.borrow().real(&full)
	}

	fn set_real(&mut self, position: &[usize], value: f64) -> Result<(), DatasetError> {
		let full = self.full_position(position)?;
		self.reference.borrow_mut().set_real(&full, value)
	}

	fn integer(&self, position: &[usize]) -> Result<i64, DatasetError> {
		let full = self.full_position(position)?;
		self.reference.borrow().integer(&full)
	}

	fn set_integer(&mut self, position: &[usize], value: i64) -> Result<(), DatasetError> {
		let full = self.full_position(position)?;
		self.reference.borrow_mut().set_integer(&full, value)
	}

	fn subset(&self, axis_value: usize) -> Result<DatasetRef, DatasetError> {
		self.subset_at(&[axis_value])
	}

	fn subset_at(&self, partial: &[usize]) -> Result<DatasetRef, DatasetError> {
		if partial.is_empty() || partial.len() > self.dimensions.len() {
			return Err(DatasetError::InvalidArgument(format!(
				"partial index of {} axes invalid for a view of {} axes",
				partial.len(),
				self.dimensions.len()
			)));
		}
		// Walk the reference axes from outermost to innermost, copying pinned
		// values through and consuming one view coordinate per free axis.
		let mut reference_partial = Vec::new();
		let mut remaining = partial;
		let mut axis = self.fixed.len();
		while !remaining.is_empty() {
			axis -= 1;
			match self.fixed[axis] {
				Some(value) => reference_partial.push(value),
				None => {
					reference_partial.push(remaining[0]);
					remaining = &remaining[1..];
				}
			}
		}
		// Every axis inward of the truncation point must be free, otherwise
		// the partial index cannot stand for a subset of the reference.
		if let Some(first_fixed) = self.first_fixed_axis {
			if first_fixed < axis {
				return Err(DatasetError::InvalidArgument(format!(
					"axis {} is fixed but lies inward of the subset boundary at axis {}",
					first_fixed, axis
				)));
			}
		}
		self.reference.borrow().subset_at(&reference_partial)
	}

	fn insert_new_subset(&mut self, _position: usize) -> Result<DatasetRef, DatasetError> {
		Err(DatasetError::UnsupportedOperation(
			"insert subset into a view".to_owned(),
		))
	}

	fn remove_subset(&mut self, _position: usize) -> Result<DatasetRef, DatasetError> {
		Err(DatasetError::UnsupportedOperation(
			"remove subset from a view".to_owned(),
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
		let limit = self.reference.borrow().addressable_axes();
		self.view_axes
			.iter()
			.enumerate()
			.take_while(|(index, axis)| **axis == *index && **axis < limit)
			.count()
	}

	fn data(&self) -> Result<&Buffer, DatasetError> {
		Err(DatasetError::UnsupportedOperation(
			"view owns no storage".to_owned(),
		))
	}

	fn set_data(&mut self, _data: Buffer) -> Result<(), DatasetError> {
		Err(DatasetError::UnsupportedOperation(
			"view owns no storage".to_owned(),
		))
	}

	fn release_data(&mut self) {}
}

impl fmt::Debug for DatasetView {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DatasetView")
			.field("dimensions", &self.dimensions)
			.field("fixed", &self.fixed)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ArrayDataset, CompositeDataset};
	use lumen_coords::{element_count, raster_to_position};

	fn filled_planes(dimensions: &[usize]) -> DatasetRef {
		let dataset = CompositeDataset::with_planes(dimensions, SampleType::F64).unwrap();
		for raster in 0..element_count(dimensions) {
			let position = raster_to_position(dimensions, raster).unwrap();
			dataset
				.borrow_mut()
				.set_real(&position, raster as f64)
				.unwrap();
		}
		dataset
	}

	/// A composite nested all the way down to rank-1 planar leaves.
	fn nested(dimensions: &[usize], sample_type: SampleType) -> DatasetRef {
		match dimensions.split_last() {
			None | Some((_, [])) => ArrayDataset::zeros(dimensions, sample_type),
			Some((&outermost, inner)) => {
				let children = (0..outermost).map(|_| nested(inner, sample_type)).collect();
				CompositeDataset::new(children).unwrap()
			}
		}
	}

	#[test]
	fn test_transparency() {
		let reference = filled_planes(&[5, 5, 3]);
		let view =
			DatasetView::new(reference.clone(), vec![None, None, Some(1)]).unwrap();
		assert_eq!(view.borrow().dimensions(), &[5, 5]);
		for x in 0..5 {
			for y in 0..5 {
				assert_eq!(
					view.borrow().real(&[x, y]).unwrap(),
					reference.borrow().real(&[x, y, 1]).unwrap()
				);
			}
		}
	}

	#[test]
	fn test_mutation_through_view() {
		let reference = filled_planes(&[5, 5, 3]);
		let view =
			DatasetView::new(reference.clone(), vec![None, None, Some(2)]).unwrap();
		view.borrow_mut().set_real(&[3, 4], -1.0).unwrap();
		assert_eq!(reference.borrow().real(&[3, 4, 2]).unwrap(), -1.0);
		assert_eq!(view.borrow().real(&[3, 4]).unwrap(), -1.0);
	}

	#[test]
	fn test_construction_errors() {
		let reference = filled_planes(&[5, 5, 3]);
		assert!(matches!(
			DatasetView::new(reference.clone(), vec![None, None]),
			Err(DatasetError::InvalidArgument(_))
		));
		assert!(matches!(
			DatasetView::new(reference.clone(), vec![Some(0), Some(1), Some(2)]),
			Err(DatasetError::InvalidArgument(_))
		));
		assert!(matches!(
			DatasetView::new(reference, vec![None, None, Some(3)]),
			Err(DatasetError::OutOfRange(_))
		));
	}

	#[test]
	fn test_subset_rejects_fixed_axis_inward_of_boundary() {
		// Axis 0 is fixed, axes 1..=3 are free. A one-element partial index
		// truncates nothing but the outermost axis, so fixed axis 0 survives
		// inward of the boundary and the subset is ambiguous.
		let reference = nested(&[5, 5, 3, 4], SampleType::F64);
		let view =
			DatasetView::new(reference, vec![Some(2), None, None, None]).unwrap();
		assert_eq!(view.borrow().dimensions(), &[5, 3, 4]);
		assert!(matches!(
			view.borrow().subset_at(&[1]),
			Err(DatasetError::InvalidArgument(_))
		));
		assert!(matches!(
			view.borrow().subset(1),
			Err(DatasetError::InvalidArgument(_))
		));
	}

	#[test]
	fn test_subset_rejection_boundary_is_conservative() {
		// Axis 2 is fixed between free axes. A partial index stopping short
		// of it is rejected even though the outermost free axis alone could
		// be resolved; the boundary check is deliberately conservative.
		let reference = nested(&[5, 5, 3, 4], SampleType::F64);
		let view =
			DatasetView::new(reference, vec![None, None, Some(1), None]).unwrap();
		assert!(matches!(
			view.borrow().subset_at(&[2]),
			Err(DatasetError::InvalidArgument(_))
		));
	}

	#[test]
	fn test_subset_interleaves_fixed_axes() {
		// Same view, but the partial index reaches past the fixed axis, so
		// its pinned value is interleaved into the reference partial index.
		let reference = nested(&[5, 5, 3, 4], SampleType::F64);
		reference.borrow_mut().set_real(&[4, 3, 1, 2], 8.0).unwrap();
		let view =
			DatasetView::new(reference.clone(), vec![None, None, Some(1), None]).unwrap();
		let subset = view.borrow().subset_at(&[2, 3]).unwrap();
		assert_eq!(subset.borrow().dimensions(), &[5]);
		assert_eq!(subset.borrow().real(&[4]).unwrap(), 8.0);
	}

	#[test]
	fn test_subset_with_all_axes_free() {
		let reference = filled_planes(&[5, 5, 3]);
		let view = DatasetView::new(reference.clone(), vec![None, None, None]).unwrap();
		let plane = view.borrow().subset(2).unwrap();
		assert!(Rc::ptr_eq(&plane, &reference.borrow().subset(2).unwrap()));
	}

	#[test]
	fn test_addressable_axes() {
		let reference = filled_planes(&[5, 5, 3]);
		let innermost_free =
			DatasetView::new(reference.clone(), vec![None, None, Some(0)]).unwrap();
		assert_eq!(innermost_free.borrow().addressable_axes(), 2);
		let innermost_fixed =
			DatasetView::new(reference, vec![Some(0), None, None]).unwrap();
		assert_eq!(innermost_fixed.borrow().addressable_axes(), 0);
	}

	#[test]
	fn test_integer_access() {
		let reference = CompositeDataset::with_planes(&[2, 2, 2], SampleType::I16).unwrap();
		let view =
			DatasetView::new(reference.clone(), vec![None, None, Some(1)]).unwrap();
		assert_eq!(view.borrow().sample_type(), SampleType::I16);
		view.borrow_mut().set_integer(&[1, 0], 12).unwrap();
		assert_eq!(reference.borrow().integer(&[1, 0, 1]).unwrap(), 12);
	}

	#[test]
	fn test_structural_mutation_unsupported() {
		let reference = filled_planes(&[5, 5, 3]);
		let view = DatasetView::new(reference, vec![None, None, Some(0)]).unwrap();
		assert!(matches!(
			view.borrow_mut().insert_new_subset(0),
			Err(DatasetError::UnsupportedOperation(_))
		));
		assert!(matches!(
			view.borrow_mut().remove_subset(0),
			Err(DatasetError::UnsupportedOperation(_))
		));
		assert!(matches!(
			view.borrow_mut().set_data(Buffer::zeros(SampleType::F64, 1)),
			Err(DatasetError::UnsupportedOperation(_))
		));
	}

	#[test]
	fn test_metadata_follows_free_axes() {
		let reference = filled_planes(&[5, 5, 3]);
		reference.borrow_mut().set_metadata(Metadata {
			name: "stack".to_owned(),
			axis_labels: vec!["x".to_owned(), "y".to_owned(), "channel".to_owned()],
		});
		let view = DatasetView::new(reference, vec![None, None, Some(1)]).unwrap();
		let view = view.borrow();
		let metadata = view.metadata();
		assert_eq!(metadata.name, "stack");
		assert_eq!(metadata.axis_labels, vec!["x".to_owned(), "y".to_owned()]);
	}
}
