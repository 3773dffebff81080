//! Per-box dispatch.
//!
//! Tiles and field boxes are independent of each other, so work on them is
//! spread over the rayon thread pool when the `rayon` feature is enabled.

#[cfg(feature = "rayon")]
pub fn for_each_mut<T, F>(items: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Send + Sync,
{
    use rayon::iter::{
        IndexedParallelIterator as _,
        IntoParallelRefMutIterator as _,
        ParallelIterator as _,
    };

    items
        .par_iter_mut()
        .enumerate()
        .for_each(|(index, item)| f(index, item));
}

#[cfg(not(feature = "rayon"))]
pub fn for_each_mut<T, F>(items: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Send + Sync,
{
    items
        .iter_mut()
        .enumerate()
        .for_each(|(index, item)| f(index, item));
}

#[cfg(feature = "rayon")]
pub fn map<T, U, F>(items: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(usize, &T) -> U + Send + Sync,
{
    use rayon::iter::{
        IndexedParallelIterator as _,
        IntoParallelRefIterator as _,
        ParallelIterator as _,
    };

    items
        .par_iter()
        .enumerate()
        .map(|(index, item)| f(index, item))
        .collect()
}

#[cfg(not(feature = "rayon"))]
pub fn map<T, U, F>(items: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(usize, &T) -> U + Send + Sync,
{
    items
        .iter()
        .enumerate()
        .map(|(index, item)| f(index, item))
        .collect()
}
