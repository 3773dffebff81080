use nalgebra::{
    Point3,
    Vector3,
};

use crate::{
    mesh::{
        BoxArray,
        IndexBox,
        Periodicity,
        Staggering,
        Strider,
        box_diff,
    },
    parallel,
};

/// Field data of one box: `num_components` values for every index of the
/// box grown by the guard width.
#[derive(Clone, derive_more::Debug)]
pub struct Fab {
    valid: IndexBox,
    grown: IndexBox,
    strider: Strider,
    num_components: usize,
    #[debug("[f64; {}]", data.len())]
    data: Box<[f64]>,
}

impl Fab {
    fn new(valid: IndexBox, guard_width: &Vector3<i64>, num_components: usize) -> Self {
        let grown = valid.grow(guard_width);
        let strider = Strider::new(&grown);
        Self {
            valid,
            grown,
            strider,
            num_components,
            data: vec![0.0; strider.len() * num_components].into_boxed_slice(),
        }
    }

    pub fn valid_box(&self) -> &IndexBox {
        &self.valid
    }

    /// The valid box including guard cells.
    pub fn grown_box(&self) -> &IndexBox {
        &self.grown
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    fn linear_index(&self, point: &Point3<i64>, component: usize) -> usize {
        debug_assert!(component < self.num_components);
        debug_assert!(
            self.grown.contains(point),
            "{point:?} outside of {:?}",
            self.grown
        );
        component * self.strider.len() + self.strider.index_unchecked(point)
    }

    pub fn get(&self, point: &Point3<i64>, component: usize) -> Option<f64> {
        let index = self.strider.index(point)?;
        (component < self.num_components)
            .then(|| self.data[component * self.strider.len() + index])
    }

    pub fn get_mut(&mut self, point: &Point3<i64>, component: usize) -> Option<&mut f64> {
        let index = self.strider.index(point)?;
        let len = self.strider.len();
        (component < self.num_components).then(|| &mut self.data[component * len + index])
    }

    /// Values of one component over the grown box, x fastest.
    pub fn component(&self, component: usize) -> &[f64] {
        let len = self.strider.len();
        &self.data[component * len..(component + 1) * len]
    }

    pub fn component_mut(&mut self, component: usize) -> &mut [f64] {
        let len = self.strider.len();
        &mut self.data[component * len..(component + 1) * len]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    fn fill(&mut self, region: &IndexBox, components: std::ops::Range<usize>, value: f64) {
        let region = region & &self.grown;
        for component in components {
            for point in region.points() {
                let index = self.linear_index(&point, component);
                self.data[index] = value;
            }
        }
    }

    /// Copies `source(point - shift)` to `self(point)` for every point in
    /// `region`.
    fn copy_region(
        &mut self,
        source: &Fab,
        region: &IndexBox,
        shift: &Vector3<i64>,
        source_component: usize,
        dest_component: usize,
        num_components: usize,
    ) {
        for c in 0..num_components {
            for point in region.points() {
                let value = source.data[source.linear_index(&(point - shift), source_component + c)];
                let index = self.linear_index(&point, dest_component + c);
                self.data[index] = value;
            }
        }
    }

    fn gather(&self, region: &IndexBox, shift: &Vector3<i64>) -> Vec<f64> {
        (0..self.num_components)
            .flat_map(|component| {
                region
                    .points()
                    .map(move |point| self.data[self.linear_index(&(point - shift), component)])
            })
            .collect()
    }

    fn scatter(&mut self, region: &IndexBox, values: &[f64]) {
        let mut values = values.iter();
        for component in 0..self.num_components {
            for point in region.points() {
                let index = self.linear_index(&point, component);
                if let Some(value) = values.next() {
                    self.data[index] = *value;
                }
            }
        }
    }
}

/// A field defined over a [`BoxArray`], with guard cells around every box.
///
/// Values are zero-initialized. Boxes are processed in parallel when the
/// `rayon` feature is enabled.
#[derive(Clone, Debug)]
pub struct MultiField {
    boxes: BoxArray,
    num_components: usize,
    guard_width: Vector3<i64>,
    fabs: Vec<Fab>,
}

impl MultiField {
    pub fn new(boxes: BoxArray, num_components: usize, guard_width: Vector3<i64>) -> Self {
        let fabs = boxes
            .iter()
            .map(|bx| Fab::new(*bx, &guard_width, num_components))
            .collect();

        Self {
            boxes,
            num_components,
            guard_width,
            fabs,
        }
    }

    pub fn boxes(&self) -> &BoxArray {
        &self.boxes
    }

    pub fn staggering(&self) -> Staggering {
        self.boxes.staggering()
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    pub fn guard_width(&self) -> &Vector3<i64> {
        &self.guard_width
    }

    pub fn has_guard_cells(&self) -> bool {
        self.guard_width.max() > 0
    }

    pub fn fabs(&self) -> &[Fab] {
        &self.fabs
    }

    pub fn fabs_mut(&mut self) -> &mut [Fab] {
        &mut self.fabs
    }

    /// Size of the field data in bytes.
    pub fn memory_size(&self) -> usize {
        self.fabs
            .iter()
            .map(|fab| size_of_val(fab.data()))
            .sum()
    }

    /// Value at a point of the valid region. If boxes share the point (nodal
    /// staggering), the first box wins.
    pub fn get(&self, point: &Point3<i64>, component: usize) -> Option<f64> {
        self.fabs
            .iter()
            .find(|fab| fab.valid.contains(point))
            .and_then(|fab| fab.get(point, component))
    }

    /// Sets a component at a point in every box whose valid region contains
    /// it.
    pub fn set(&mut self, point: &Point3<i64>, component: usize, value: f64) {
        for fab in &mut self.fabs {
            if fab.valid.contains(point)
                && let Some(target) = fab.get_mut(point, component)
            {
                *target = value;
            }
        }
    }

    pub fn set_val(&mut self, value: f64) {
        parallel::for_each_mut(&mut self.fabs, |_, fab| fab.data.fill(value));
    }

    /// Sets `num_components` components starting at `component` over the
    /// valid region grown by `guard_width`.
    pub fn set_val_components(
        &mut self,
        value: f64,
        component: usize,
        num_components: usize,
        guard_width: &Vector3<i64>,
    ) {
        assert!(component + num_components <= self.num_components);
        parallel::for_each_mut(&mut self.fabs, |_, fab| {
            let region = fab.valid.grow(guard_width);
            fab.fill(&region, component..component + num_components, value);
        });
    }

    /// Sets one component over the grown boxes from a function of the index.
    pub fn set_with<F>(&mut self, component: usize, f: F)
    where
        F: Fn(&Point3<i64>) -> f64 + Send + Sync,
    {
        assert!(component < self.num_components);
        parallel::for_each_mut(&mut self.fabs, |_, fab| {
            let grown = fab.grown;
            for point in grown.points() {
                let index = fab.linear_index(&point, component);
                fab.data[index] = f(&point);
            }
        });
    }

    /// Copies components between two fields with the same boxes.
    pub fn copy_components(
        &mut self,
        source: &MultiField,
        source_component: usize,
        dest_component: usize,
        num_components: usize,
        guard_width: &Vector3<i64>,
    ) {
        assert_eq!(self.boxes, source.boxes, "copy between different layouts");
        assert!(source_component + num_components <= source.num_components);
        assert!(dest_component + num_components <= self.num_components);

        parallel::for_each_mut(&mut self.fabs, |index, fab| {
            let region = fab.valid.grow(guard_width) & fab.grown;
            fab.copy_region(
                &source.fabs[index],
                &region,
                &Vector3::zeros(),
                source_component,
                dest_component,
                num_components,
            );
        });
    }

    /// Copies one component of the guard cells between two fields with the
    /// same boxes. Valid regions are not touched, even where a neighbouring
    /// box's guard cells overlap them.
    pub fn copy_guard_cells(&mut self, source: &MultiField, component: usize) {
        assert_eq!(self.boxes, source.boxes, "copy between different layouts");
        assert_eq!(self.guard_width, source.guard_width);

        parallel::for_each_mut(&mut self.fabs, |index, fab| {
            for guard in box_diff(&fab.grown, &fab.valid) {
                fab.copy_region(
                    &source.fabs[index],
                    &guard,
                    &Vector3::zeros(),
                    component,
                    component,
                    1,
                );
            }
        });
    }

    /// Sum of all components over the valid region, as a new single-component
    /// field without guard cells.
    pub fn sum_components(&self) -> MultiField {
        let mut total = MultiField::new(self.boxes.clone(), 1, Vector3::zeros());

        parallel::for_each_mut(&mut total.fabs, |index, fab| {
            let source = &self.fabs[index];
            for point in fab.valid.points() {
                let sum = (0..source.num_components)
                    .map(|component| source.data[source.linear_index(&point, component)])
                    .sum();
                let index = fab.linear_index(&point, 0);
                fab.data[index] = sum;
            }
        });

        total
    }

    /// Copies from another field with a possibly different box layout.
    ///
    /// Every index of the destination's valid region grown by
    /// `dest_guard_width` that is covered by the source's valid region grown
    /// by `source_guard_width` (or a periodic image of it) receives the
    /// source value.
    #[allow(clippy::too_many_arguments)]
    pub fn parallel_copy(
        &mut self,
        source: &MultiField,
        source_component: usize,
        dest_component: usize,
        num_components: usize,
        source_guard_width: &Vector3<i64>,
        dest_guard_width: &Vector3<i64>,
        periodicity: &Periodicity,
    ) {
        assert_eq!(
            self.staggering(),
            source.staggering(),
            "parallel copy between fields with different staggering"
        );
        assert!(source_component + num_components <= source.num_components);
        assert!(dest_component + num_components <= self.num_components);
        assert!(fits_in(source_guard_width, &source.guard_width));
        assert!(fits_in(dest_guard_width, &self.guard_width));

        let shifts = periodicity.shifts();
        let source_regions = source
            .fabs
            .iter()
            .map(|fab| fab.valid.grow(source_guard_width))
            .collect::<Vec<_>>();

        parallel::for_each_mut(&mut self.fabs, |_, dest| {
            let dest_region = dest.valid.grow(dest_guard_width);
            for (source, source_region) in source.fabs.iter().zip(&source_regions) {
                for shift in &shifts {
                    let overlap = dest_region & source_region.shift(shift);
                    if !overlap.is_empty() {
                        dest.copy_region(
                            source,
                            &overlap,
                            shift,
                            source_component,
                            dest_component,
                            num_components,
                        );
                    }
                }
            }
        });
    }

    /// Fills guard cells from the valid regions of the other boxes and the
    /// periodic images of all boxes. Valid regions are not modified.
    pub fn fill_boundary(&mut self, periodicity: &Periodicity) {
        if !self.has_guard_cells() {
            return;
        }

        let shifts = periodicity.shifts();
        let fabs = &self.fabs;

        let updates = parallel::map(fabs, |index, dest| {
            let mut updates = vec![];
            for guard in box_diff(&dest.grown, &dest.valid) {
                for (source_index, source) in fabs.iter().enumerate() {
                    for shift in &shifts {
                        if source_index == index && *shift == Vector3::zeros() {
                            continue;
                        }
                        let overlap = guard & source.valid.shift(shift);
                        if !overlap.is_empty() {
                            updates.push((overlap, source.gather(&overlap, shift)));
                        }
                    }
                }
            }
            updates
        });

        parallel::for_each_mut(&mut self.fabs, |index, fab| {
            for (region, values) in &updates[index] {
                fab.scatter(region, values);
            }
        });
    }
}

fn fits_in(guard_width: &Vector3<i64>, allocated: &Vector3<i64>) -> bool {
    guard_width.iter().zip(allocated.iter()).all(|(n, m)| n <= m)
}

#[cfg(test)]
mod tests {
    use nalgebra::{
        Point3,
        Vector3,
    };

    use crate::mesh::{
        BoxArray,
        Geometry,
        IndexBox,
        MultiField,
        Periodicity,
        SpaceDim,
        Staggering,
    };

    fn cell_box(lo: [i64; 3], hi: [i64; 3]) -> IndexBox {
        IndexBox::new(Point3::from(lo), Point3::from(hi))
    }

    fn two_blocks() -> BoxArray {
        BoxArray::new([
            cell_box([0, 0, 0], [7, 7, 0]),
            cell_box([8, 0, 0], [15, 7, 0]),
        ])
    }

    #[test]
    fn it_starts_zeroed() {
        let field = MultiField::new(two_blocks(), 2, Vector3::new(2, 2, 0));
        assert!(field.fabs().iter().all(|fab| fab.data().iter().all(|x| *x == 0.0)));
        assert_eq!(field.fabs()[0].grown_box(), &cell_box([-2, -2, 0], [9, 9, 0]));
    }

    #[test]
    fn memory_size_counts_guard_cells_and_components() {
        let field = MultiField::new(two_blocks(), 2, Vector3::new(2, 2, 0));
        // two 12x12 grown boxes
        assert_eq!(field.memory_size(), 2 * 2 * 12 * 12 * 8);
    }

    #[test]
    fn sum_components_adds_split_parts() {
        let mut field = MultiField::new(two_blocks(), 3, Vector3::new(1, 1, 0));
        field.set_with(0, |p| p.x as f64);
        field.set_with(1, |p| p.y as f64);
        field.set_with(2, |_| 1.0);

        let total = field.sum_components();
        assert_eq!(total.num_components(), 1);
        assert_eq!(total.guard_width(), &Vector3::zeros());
        assert_eq!(total.get(&Point3::new(9, 3, 0), 0), Some(13.0));
    }

    #[test]
    fn parallel_copy_respects_destination_guard_width() {
        let source_boxes = BoxArray::new([cell_box([0, 0, 0], [15, 7, 0])]);
        let mut source = MultiField::new(source_boxes, 1, Vector3::zeros());
        source.set_val(5.0);

        let dest_boxes = BoxArray::new([cell_box([16, 0, 0], [19, 7, 0])]);
        let mut dest = MultiField::new(dest_boxes, 1, Vector3::new(2, 2, 0));
        dest.parallel_copy(
            &source,
            0,
            0,
            1,
            &Vector3::zeros(),
            &Vector3::new(2, 2, 0),
            &Periodicity::non_periodic(SpaceDim::Two),
        );

        let fab = &dest.fabs()[0];
        assert_eq!(fab.get(&Point3::new(14, 3, 0), 0), Some(5.0));
        assert_eq!(fab.get(&Point3::new(15, 3, 0), 0), Some(5.0));
        assert_eq!(fab.get(&Point3::new(16, 3, 0), 0), Some(0.0));
    }

    #[test]
    fn fill_boundary_wraps_periodic_images() {
        let geometry = Geometry {
            dims: SpaceDim::Two,
            domain: cell_box([0, 0, 0], [15, 7, 0]),
            origin: Point3::origin(),
            cell_size: Vector3::repeat(1.0),
            periodic: [true, false, false],
        };
        let mut field = MultiField::new(two_blocks(), 1, Vector3::new(1, 1, 0));
        field.set_with(0, |p| if (0..16).contains(&p.x) { p.x as f64 } else { -1.0 });

        field.fill_boundary(&geometry.periodicity());

        let left = &field.fabs()[0];
        let right = &field.fabs()[1];
        // periodic wrap
        assert_eq!(left.get(&Point3::new(-1, 3, 0), 0), Some(15.0));
        assert_eq!(right.get(&Point3::new(16, 3, 0), 0), Some(0.0));
        // neighbouring block
        assert_eq!(left.get(&Point3::new(8, 3, 0), 0), Some(8.0));
        assert_eq!(right.get(&Point3::new(7, 3, 0), 0), Some(7.0));
        // nothing to fill from along the non-periodic axis
        assert_eq!(left.get(&Point3::new(3, -1, 0), 0), Some(3.0));
    }

    #[test]
    fn set_val_components_leaves_other_components() {
        let boxes = BoxArray::new([cell_box([0, 0, 0], [3, 3, 0])]).convert(Staggering::X);
        let mut field = MultiField::new(boxes, 3, Vector3::new(1, 1, 0));
        field.set_val(2.0);
        field.set_val_components(0.0, 1, 2, &Vector3::zeros());

        let fab = &field.fabs()[0];
        assert_eq!(fab.get(&Point3::new(4, 3, 0), 0), Some(2.0));
        assert_eq!(fab.get(&Point3::new(4, 3, 0), 1), Some(0.0));
        assert_eq!(fab.get(&Point3::new(4, 3, 0), 2), Some(0.0));
        assert_eq!(fab.get(&Point3::new(5, 3, 0), 2), Some(2.0));
    }
}
