/// Returns the rank of the worker owning `vertex_id` among `nworkers`
/// workers. Workers are ranked `1..=nworkers`; rank 0 is the master.
///
/// This is a pure function of its arguments, so the master (when it
/// distributes vertices) and every worker (when it routes messages) agree
/// on ownership without talking to each other.
///
/// # Panics
///
/// If `nworkers` is zero. A run never gets this far with zero workers.
#[inline]
pub fn partition(vertex_id: i64, nworkers: usize) -> usize {
    assert!(nworkers > 0, "cannot partition over zero workers");
    vertex_id.rem_euclid(nworkers as i64) as usize + 1
}
