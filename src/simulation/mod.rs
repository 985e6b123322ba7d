mod barnes_hut;
mod brute_force;

pub use barnes_hut::*;
pub use brute_force::*;

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        use rayon::prelude::*;

        /// Evaluates `eval` for every particle index on the rayon pool.
        pub(crate) fn evaluate_all<T, E>(len: usize, eval: E) -> Vec<T>
        where
            T: Send,
            E: Fn(usize) -> T + Send + Sync,
        {
            (0..len).into_par_iter().map(eval).collect()
        }
    } else {
        pub(crate) fn evaluate_all<T, E>(len: usize, eval: E) -> Vec<T>
        where
            T: Send,
            E: Fn(usize) -> T + Send + Sync,
        {
            (0..len).map(eval).collect()
        }
    }
}
