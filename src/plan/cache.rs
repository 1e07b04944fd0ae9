use super::{Plan, Record};

use std::{any, collections, sync};

type AnyPlan = sync::Arc<dyn any::Any + Send + Sync>;

type Cache = sync::RwLock<collections::HashMap<any::TypeId, AnyPlan>>;

static PLANS: sync::LazyLock<Cache> = sync::LazyLock::new(Default::default);

fn cached<S: Record>() -> Option<sync::Arc<Plan<S>>> {
    let plans = PLANS.read().unwrap_or_else(sync::PoisonError::into_inner);
    let plan = plans.get(&any::TypeId::of::<S>())?;
    sync::Arc::clone(plan).downcast().ok()
}

/// The plan of `S`, synthesized on first use and shared afterwards.
///
/// Synthesis runs with no lock held; when two threads race on the same type
/// the first to publish wins and the other adopts its plan.
pub fn plan_for<S: Record>() -> sync::Arc<Plan<S>> {
    if let Some(plan) = cached::<S>() {
        return plan;
    }
    let synthesized = sync::Arc::new(Plan::<S>::synthesize());
    let mut plans = PLANS.write().unwrap_or_else(sync::PoisonError::into_inner);
    let published = plans
        .entry(any::TypeId::of::<S>())
        .or_insert_with(|| sync::Arc::clone(&synthesized) as AnyPlan);
    sync::Arc::clone(published)
        .downcast()
        .unwrap_or(synthesized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Fields;

    use std::thread;

    #[derive(Default)]
    struct Shared {
        id: u64,
    }

    impl Record for Shared {
        fn describe(fields: &mut Fields<Self>) {
            fields.field(
                "id",
                "ID,hash",
                |shared: &Self| &shared.id,
                |shared: &mut Self| &mut shared.id,
            );
        }
    }

    #[test]
    fn test_plan_for_is_shared_across_threads() {
        let plans: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(plan_for::<Shared>))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });
        let first = plan_for::<Shared>();
        assert!(plans.iter().all(|plan| sync::Arc::ptr_eq(plan, &first)));
        assert_eq!(first.fields().count(), 1);
    }
}
