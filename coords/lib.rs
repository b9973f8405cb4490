/*!
This crate provides the coordinate arithmetic underneath Lumen's n-dimensional datasets: odometer-style position increments, bounds checks, and conversion between flat raster indexes and coordinate tuples.

A coordinate tuple is a sequence of `usize` values, one per axis, with axis 0 the fastest-varying axis. Three tuples travel together through most operations: a *position*, an *origin* (inclusive lower bound per axis), and a *span* (extent per axis), so that the inclusive range on axis `i` is `[origin[i], origin[i] + span[i] - 1]`. All three must have the same length within one operation.
*/

use itertools::izip;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error("out of range: {0}")]
	OutOfRange(String),
}

/// Creates a coordinate tuple of the given length with every axis at zero.
pub fn zeros(len: usize) -> Vec<usize> {
	vec![0; len]
}

/// Returns the number of elements addressed by `dimensions`, which is the
/// product of all extents. An empty tuple counts one element, the single
/// "point" position.
pub fn element_count(dimensions: &[usize]) -> u64 {
	dimensions.iter().map(|dimension| *dimension as u64).product()
}

/// Returns true iff every axis of `position` lies within
/// `[origin, origin + span - 1]`. Zero-length tuples are always valid.
pub fn is_valid(position: &[usize], origin: &[usize], span: &[usize]) -> bool {
	debug_assert!(position.len() == origin.len() && origin.len() == span.len());
	izip!(position, origin, span)
		.all(|(position, origin, span)| *position >= *origin && *position < *origin + *span)
}

/// Advances `position` in place like an odometer: axis 0 increments first,
/// and an axis that overflows its span resets to its origin and carries into
/// the next axis. When the last axis overflows the position is left past its
/// bound, so callers detect the end of iteration by checking [`is_valid`]
/// after each increment. A zero-length position never changes and never
/// becomes invalid; callers iterating a zero-length region must count the
/// single point themselves.
pub fn increment(position: &mut [usize], origin: &[usize], span: &[usize]) {
	debug_assert!(position.len() == origin.len() && origin.len() == span.len());
	for axis in 0..position.len() {
		position[axis] += 1;
		if position[axis] < origin[axis] + span[axis] {
			return;
		}
		if axis + 1 == position.len() {
			// Exhausted: leave the last axis past its bound.
			return;
		}
		position[axis] = origin[axis];
	}
}

/// Converts a flat scan-order index into a coordinate tuple, treating
/// `dimensions` as mixed-radix digit weights with axis 0 fastest.
pub fn raster_to_position(dimensions: &[usize], raster: u64) -> Result<Vec<usize>, CoordError> {
	let count = element_count(dimensions);
	if raster >= count {
		return Err(CoordError::InvalidArgument(format!(
			"raster index {} out of [0, {})",
			raster, count
		)));
	}
	let mut position = zeros(dimensions.len());
	let mut remainder = raster;
	for (axis, dimension) in dimensions.iter().enumerate() {
		position[axis] = (remainder % *dimension as u64) as usize;
		remainder /= *dimension as u64;
	}
	Ok(position)
}

/// Converts a coordinate tuple into its flat scan-order index, the inverse of
/// [`raster_to_position`].
pub fn position_to_raster(dimensions: &[usize], position: &[usize]) -> Result<u64, CoordError> {
	if position.len() != dimensions.len() {
		return Err(CoordError::InvalidArgument(format!(
			"position has {} axes but dimensions have {}",
			position.len(),
			dimensions.len()
		)));
	}
	let mut raster = 0u64;
	let mut weight = 1u64;
	for (axis, (position, dimension)) in izip!(position, dimensions).enumerate() {
		if *position >= *dimension {
			return Err(CoordError::OutOfRange(format!(
				"position {} out of range for axis {} of size {}",
				position, axis, dimension
			)));
		}
		raster += *position as u64 * weight;
		weight *= *dimension as u64;
	}
	Ok(raster)
}

/// An origin/span pair describing an axis-aligned block of coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
	pub origin: Vec<usize>,
	pub span: Vec<usize>,
}

impl Region {
	pub fn new(origin: Vec<usize>, span: Vec<usize>) -> Result<Self, CoordError> {
		if origin.len() != span.len() {
			return Err(CoordError::InvalidArgument(format!(
				"origin has {} axes but span has {}",
				origin.len(),
				span.len()
			)));
		}
		Ok(Self { origin, span })
	}

	/// The region covering every position of the given dimensions.
	pub fn whole(dimensions: &[usize]) -> Self {
		Self {
			origin: zeros(dimensions.len()),
			span: dimensions.to_vec(),
		}
	}

	pub fn num_axes(&self) -> usize {
		self.origin.len()
	}

	pub fn contains(&self, position: &[usize]) -> bool {
		position.len() == self.num_axes() && is_valid(position, &self.origin, &self.span)
	}

	pub fn element_count(&self) -> u64 {
		element_count(&self.span)
	}

	/// Returns true iff every position of this region lies within
	/// `[0, dimensions)` on every axis.
	pub fn fits_within(&self, dimensions: &[usize]) -> bool {
		self.num_axes() == dimensions.len()
			&& izip!(&self.origin, &self.span, dimensions)
				.all(|(origin, span, dimension)| origin + span <= *dimension)
	}
}
