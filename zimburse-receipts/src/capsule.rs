//! Capsules: fixed-width chunks of deferred body bytes handed to the prover
//! out of band.

use zimburse_common::Field;

use crate::united::DeferredBody;

/// Field elements per capsule.
pub const CAPSULE_SIZE: usize = 2048;

/// Break `data` into zero-padded capsules of `chunk_size` field elements, one
/// byte per element. Capsules come back in insertion order, which is the
/// reverse of their position in `data`, since the prover pops from a stack.
pub fn break_into_capsules(data: &[u8], chunk_size: usize) -> Vec<Vec<Field>> {
    let chunk_size = chunk_size.max(1);
    let mut capsules: Vec<Vec<Field>> = data
        .chunks(chunk_size)
        .map(|chunk| {
            let mut capsule: Vec<Field> = chunk.iter().map(|byte| Field::from(*byte)).collect();
            capsule.resize(chunk_size, Field::ZERO);
            capsule
        })
        .collect();
    capsules.reverse();
    capsules
}

/// Capsules for a deferred body: `remaining` first, then `amount_to_date`.
pub fn deferred_capsules(deferred: &DeferredBody) -> Vec<Vec<Field>> {
    let mut capsules = break_into_capsules(&deferred.remaining, CAPSULE_SIZE);
    capsules.extend(break_into_capsules(&deferred.amount_to_date, CAPSULE_SIZE));
    capsules
}
