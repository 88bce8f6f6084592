//! Proportional mixture allocation: split a component list into a `kept`
//! remainder and an `extracted` share summing exactly to the requested
//! quantity, preserving each component's share of the mixture.
//!
//! Ported from the reference `_proportional_allocation` routine, using
//! `rust_decimal` in place of Python's `Decimal` for fixed-point arithmetic.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::entities::MixtureComponent;
use crate::errors::ServiceError;

/// Rounding unit applied to each non-final component's take, matching the
/// reference implementation's 1e-7 granularity.
const ROUND_DP: u32 = 7;

pub struct AllocationResult {
    pub kept: Vec<MixtureComponent>,
    pub extracted: Vec<MixtureComponent>,
}

/// `components` must be non-empty when `requested > 0`. Ordering and
/// `batch_id`s are preserved in both output lists.
pub fn allocate(
    components: &[MixtureComponent],
    requested: Decimal,
) -> Result<AllocationResult, ServiceError> {
    let total: Decimal = components.iter().map(|c| c.qty_remaining).sum();

    if requested > total {
        return Err(ServiceError::InsufficientQuantity {
            requested: requested.to_string(),
            available: total.to_string(),
        });
    }

    let n = components.len();
    let mut kept = Vec::with_capacity(n);
    let mut extracted = Vec::with_capacity(n);
    let mut allocated = Decimal::ZERO;

    for (i, component) in components.iter().enumerate() {
        let share = if total > Decimal::ZERO {
            component.qty_remaining / total
        } else {
            Decimal::ZERO
        };

        let mut take = if i + 1 < n {
            (requested * share).round_dp(ROUND_DP)
        } else {
            requested - allocated
        };

        if take < Decimal::ZERO {
            take = Decimal::ZERO;
        }
        if take > component.qty_remaining {
            take = component.qty_remaining;
        }

        kept.push(MixtureComponent {
            batch_id: component.batch_id.clone(),
            qty_initial: component.qty_initial,
            qty_remaining: component.qty_remaining - take,
        });
        extracted.push(MixtureComponent {
            batch_id: component.batch_id.clone(),
            qty_initial: take,
            qty_remaining: take,
        });

        allocated += take;
    }

    reconcile(&mut kept, &mut extracted, requested, allocated);

    Ok(AllocationResult { kept, extracted })
}

/// Residual reconciliation: rounding during per-component allocation can
/// leave `allocated` off `requested` by a few units in the last decimal
/// place. Push the signed difference onto the last pair, clamping `kept` at
/// zero and absorbing any overflow back into `extracted` so the invariant
/// `kept[i].qty_remaining + extracted[i].qty_initial == original remaining`
/// holds exactly for every component, and `sum(extracted.qty_initial) ==
/// requested` exactly.
fn reconcile(
    kept: &mut [MixtureComponent],
    extracted: &mut [MixtureComponent],
    requested: Decimal,
    allocated: Decimal,
) {
    let diff = requested - allocated;
    if diff == Decimal::ZERO {
        return;
    }
    let Some(last_kept) = kept.last_mut() else {
        return;
    };
    let Some(last_extracted) = extracted.last_mut() else {
        return;
    };

    last_extracted.qty_initial += diff;
    last_extracted.qty_remaining += diff;
    last_kept.qty_remaining -= diff;

    if last_kept.qty_remaining < Decimal::ZERO {
        let overflow = -last_kept.qty_remaining;
        last_kept.qty_remaining = Decimal::ZERO;
        last_extracted.qty_initial -= overflow;
        last_extracted.qty_remaining -= overflow;
    }

    if last_extracted.qty_initial < Decimal::ZERO {
        last_extracted.qty_initial = dec!(0);
        last_extracted.qty_remaining = dec!(0);
    }
}


/// Property tests for the allocator laws in SPEC_FULL.md §8: exact-total
/// extraction and per-component conservation across arbitrary integer
/// quantities and draw sizes.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn comp(batch_id: &str, qty: i64) -> MixtureComponent {
        MixtureComponent {
            batch_id: batch_id.to_string(),
            qty_initial: Decimal::from(qty),
            qty_remaining: Decimal::from(qty),
        }
    }

    fn components_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
        prop::collection::vec(1i64..1000, 1..6).prop_map(|qtys| {
            qtys.into_iter()
                .enumerate()
                .map(|(i, qty)| (format!("BAT{i}"), qty))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn extracted_total_matches_requested_exactly(
            comps in components_strategy(),
            draw_fraction in 0u32..=100,
        ) {
            let components: Vec<MixtureComponent> = comps
                .iter()
                .map(|(id, qty)| comp(id, *qty))
                .collect();
            let total: i64 = comps.iter().map(|(_, qty)| qty).sum();
            let requested = Decimal::from(total) * Decimal::from(draw_fraction) / Decimal::from(100);

            let result = allocate(&components, requested).unwrap();

            let extracted_total: Decimal = result.extracted.iter().map(|c| c.qty_initial).sum();
            prop_assert_eq!(extracted_total, requested);

            for ((kept, extracted), original) in
                result.kept.iter().zip(result.extracted.iter()).zip(components.iter())
            {
                prop_assert_eq!(kept.qty_remaining + extracted.qty_initial, original.qty_remaining);
                prop_assert!(kept.qty_remaining >= Decimal::ZERO);
                prop_assert!(extracted.qty_initial >= Decimal::ZERO);
            }
        }

        #[test]
        fn zero_draw_is_always_identity(comps in components_strategy()) {
            let components: Vec<MixtureComponent> = comps
                .iter()
                .map(|(id, qty)| comp(id, *qty))
                .collect();
            let result = allocate(&components, Decimal::ZERO).unwrap();
            for (kept, original) in result.kept.iter().zip(components.iter()) {
                prop_assert_eq!(kept.qty_remaining, original.qty_remaining);
            }
            for extracted in &result.extracted {
                prop_assert_eq!(extracted.qty_initial, Decimal::ZERO);
            }
        }
    }
}
