use lumen_coords::{increment, is_valid, Region};

use crate::{DatasetError, DatasetRef};

/// Drives several datasets through per-dataset regions in lock-step.
///
/// Per dataset the axes split at its directly-addressable count into an
/// inner span, read and written straight on a cached sub-dataset, and an
/// outer span traversed through `subset_at`. Resolving the sub-dataset once
/// per outer step amortizes the index translation that would otherwise run
/// on every sample.
///
/// The caller drives the loop: `position_valid` → `load_workspace` → compute
/// → `set_real`/`set_integer` → `increment_position`. Calling into an
/// invalid position is a programming error and surfaces as `OutOfRange`.
pub struct SynchronizedIterator {
	entries: Vec<Entry>,
	real_workspace: Vec<f64>,
	int_workspace: Vec<i64>,
}

struct Entry {
	dataset: DatasetRef,
	inner: Region,
	outer: Region,
	inner_position: Vec<usize>,
	outer_position: Vec<usize>,
	/// The currently-resolved directly-addressable sub-dataset, dropped when
	/// the outer position moves.
	addressable: Option<DatasetRef>,
	/// Needed beyond tuple validity: a dataset whose inner and outer tuples
	/// are both zero-length would otherwise never terminate, because empty
	/// tuples are always valid.
	exhausted: bool,
}

impl Entry {
	fn resolve(&mut self) -> Result<DatasetRef, DatasetError> {
		if let Some(addressable) = &self.addressable {
			return Ok(addressable.clone());
		}
		let resolved = if self.outer_position.is_empty() {
			self.dataset.clone()
		} else {
			let partial: Vec<usize> = self.outer_position.iter().rev().copied().collect();
			self.dataset.borrow().subset_at(&partial)?
		};
		self.addressable = Some(resolved.clone());
		Ok(resolved)
	}
}

impl SynchronizedIterator {
	/// Builds an iterator over the given datasets, each with its own region,
	/// which must match the dataset's rank and fit within its dimensions.
	pub fn new(datasets: Vec<(DatasetRef, Region)>) -> Result<Self, DatasetError> {
		let mut entries = Vec::with_capacity(datasets.len());
		for (dataset, region) in datasets {
			let dimensions = dataset.borrow().dimensions().to_vec();
			if !region.fits_within(&dimensions) {
				return Err(DatasetError::InvalidArgument(format!(
					"region origin {:?} span {:?} does not fit dataset dimensions {:?}",
					region.origin, region.span, dimensions
				)));
			}
			let mut split = dataset.borrow().addressable_axes().min(dimensions.len());
			if split < dimensions.len() {
				// Some datasets, views in particular, report a split whose
				// outer remainder cannot be resolved through subsets. Probe
				// once at the region origin and fall back to whole-dataset
				// addressing if the resolution is rejected.
				let partial: Vec<usize> = region.origin[split..].iter().rev().copied().collect();
				if dataset.borrow().subset_at(&partial).is_err() {
					split = dimensions.len();
				}
			}
			let inner = Region::new(
				region.origin[..split].to_vec(),
				region.span[..split].to_vec(),
			)?;
			let outer = Region::new(
				region.origin[split..].to_vec(),
				region.span[split..].to_vec(),
			)?;
			entries.push(Entry {
				dataset,
				inner_position: inner.origin.clone(),
				outer_position: outer.origin.clone(),
				inner,
				outer,
				addressable: None,
				exhausted: false,
			});
		}
		let real_workspace = vec![0.0; entries.len()];
		let int_workspace = vec![0; entries.len()];
		Ok(SynchronizedIterator {
			entries,
			real_workspace,
			int_workspace,
		})
	}

	pub fn num_datasets(&self) -> usize {
		self.entries.len()
	}

	/// True while every dataset's current position lies within its region.
	pub fn position_valid(&self) -> bool {
		self.entries.iter().all(|entry| {
			!entry.exhausted
				&& is_valid(&entry.outer_position, &entry.outer.origin, &entry.outer.span)
				&& is_valid(&entry.inner_position, &entry.inner.origin, &entry.inner.span)
		})
	}

	/// Reads the sample at the current position of every dataset into its
	/// workspace slot: the integer slot for integral sample types, the real
	/// slot otherwise. The addressable sub-dataset is resolved lazily and
	/// cached until the outer position moves.
	pub fn load_workspace(&mut self) -> Result<(), DatasetError> {
		for index in 0..self.entries.len() {
			let addressable = self.entries[index].resolve()?;
			let entry = &self.entries[index];
			let addressable = addressable.borrow();
			if addressable.sample_type().is_integral() {
				self.int_workspace[index] = addressable.integer(&entry.inner_position)?;
			} else {
				self.real_workspace[index] = addressable.real(&entry.inner_position)?;
			}
		}
		Ok(())
	}

	/// Advances every dataset by one sample: the inner position increments
	/// like an odometer, and on overflow the outer position advances, the
	/// cached sub-dataset is dropped, and the inner position resets to its
	/// origin. A dataset with no outer axes simply stops once its inner
	/// tuple overflows.
	pub fn increment_position(&mut self) {
		for entry in &mut self.entries {
			if entry.exhausted {
				continue;
			}
			let inner_overflowed = if entry.inner_position.is_empty() {
				true
			} else {
				increment(
					&mut entry.inner_position,
					&entry.inner.origin,
					&entry.inner.span,
				);
				!is_valid(&entry.inner_position, &entry.inner.origin, &entry.inner.span)
			};
			if !inner_overflowed {
				continue;
			}
			if entry.outer_position.is_empty() {
				entry.exhausted = true;
				continue;
			}
			increment(
				&mut entry.outer_position,
				&entry.outer.origin,
				&entry.outer.span,
			);
			if is_valid(&entry.outer_position, &entry.outer.origin, &entry.outer.span) {
				entry.addressable = None;
				entry.inner_position.copy_from_slice(&entry.inner.origin);
			} else {
				entry.exhausted = true;
			}
		}
	}

	/// The real workspace slot for the given dataset, as loaded by the most
	/// recent `load_workspace`.
	pub fn real(&self, index: usize) -> Result<f64, DatasetError> {
		self.check_index(index)?;
		Ok(self.real_workspace[index])
	}

	/// The integer workspace slot for the given dataset.
	pub fn integer(&self, index: usize) -> Result<i64, DatasetError> {
		self.check_index(index)?;
		Ok(self.int_workspace[index])
	}

	/// Writes through the cached addressable sub-dataset at the current
	/// inner position of the given dataset.
	pub fn set_real(&mut self, index: usize, value: f64) -> Result<(), DatasetError> {
		let entry = self.entry(index)?;
		let addressable = entry.resolve()?;
		let mut addressable = addressable.borrow_mut();
		addressable.set_real(&entry.inner_position, value)
	}

	pub fn set_integer(&mut self, index: usize, value: i64) -> Result<(), DatasetError> {
		let entry = self.entry(index)?;
		let addressable = entry.resolve()?;
		let mut addressable = addressable.borrow_mut();
		addressable.set_integer(&entry.inner_position, value)
	}

	/// The full current position of the given dataset, inner axes first.
	pub fn position(&self, index: usize) -> Result<Vec<usize>, DatasetError> {
		self.check_index(index)?;
		let entry = &self.entries[index];
		let mut position = entry.inner_position.clone();
		position.extend_from_slice(&entry.outer_position);
		Ok(position)
	}

	fn entry(&mut self, index: usize) -> Result<&mut Entry, DatasetError> {
		self.check_index(index)?;
		Ok(&mut self.entries[index])
	}

	fn check_index(&self, index: usize) -> Result<(), DatasetError> {
		if index >= self.entries.len() {
			return Err(DatasetError::OutOfRange(format!(
				"dataset index {} out of range for {} datasets",
				index,
				self.entries.len()
			)));
		}
		Ok(())
	}
}
