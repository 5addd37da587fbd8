//! Resolution of declarations
//!
//! One pass over a [`Declarations`] set: every demanded capability is
//! classified, buildable provisions are constructed until a fixed point is
//! reached, and the requirement slots are filled from the resulting
//! [`Injector`]. Problems are collected, never short-circuited.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use super::{
    container::Injector,
    error::{Error, Result},
    registry::{Capability, Cardinality, Collector, Declarations, Instance, Provision},
};

/// A demanded capability together with the provisions selected for it
struct Plan {
    capability: Capability,
    provisions: Vec<Provision>,
}

impl Plan {
    fn dependencies(&self) -> impl Iterator<Item = &Capability> {
        self.provisions.iter().flat_map(|p| p.dependencies.iter())
    }

    fn is_ready(&self, injector: &Injector) -> bool {
        self.dependencies().all(|dependency| injector.contains(dependency))
    }
}

pub(crate) fn resolve(declarations: Declarations) -> Vec<Error> {
    let Declarations {
        requirements,
        provisions,
        collectors,
    } = declarations;

    info!(
        "Resolving {} requirements against {} provisions",
        requirements.len(),
        provisions.len()
    );

    let mut errors = Vec::new();
    let mut failed = HashSet::new();

    let mut by_capability: HashMap<Capability, Vec<Provision>> = HashMap::new();
    for provision in provisions {
        by_capability
            .entry(provision.capability)
            .or_default()
            .push(provision);
    }

    // Requirements first, then whatever the selected provisions depend on
    let mut demanded = Vec::new();
    let mut seen = HashSet::new();
    for requirement in &requirements {
        if seen.insert(requirement.capability) {
            demanded.push(requirement.capability);
        }
    }

    let mut plans = Vec::new();
    let mut cursor = 0;
    while cursor < demanded.len() {
        let capability = demanded[cursor];
        cursor += 1;

        let candidates = by_capability.remove(&capability).unwrap_or_default();
        if capability.cardinality() == Cardinality::Single && candidates.len() != 1 {
            if candidates.is_empty() {
                errors.push(Error::ImplementationNotProvided { capability });
            } else {
                errors.push(Error::MultipleProvisionsForSingularSlot {
                    capability,
                    count: candidates.len(),
                });
            }
            failed.insert(capability);
            continue;
        }

        for dependency in candidates.iter().flat_map(|p| p.dependencies.iter()) {
            if seen.insert(*dependency) {
                demanded.push(*dependency);
            }
        }
        plans.push(Plan {
            capability,
            provisions: candidates,
        });
    }

    if !by_capability.is_empty() {
        debug!(
            "{} provided capabilities are not required by anything",
            by_capability.len()
        );
    }

    // Build until a full pass makes no progress
    let mut injector = Injector::default();
    let mut pending = plans;
    loop {
        let before = pending.len();
        let mut deferred = Vec::with_capacity(before);

        for plan in pending {
            if !plan.is_ready(&injector) {
                deferred.push(plan);
                continue;
            }
            let capability = plan.capability;
            match build(plan, &injector, collectors.get(&capability)) {
                Ok(instance) => {
                    debug!("Built {capability}");
                    injector.insert(capability, instance);
                }
                Err(err) => {
                    warn!("Provision of {capability} failed: {err}");
                    failed.insert(capability);
                    errors.push(Error::ProvisionFailed {
                        capability,
                        source: Box::new(err),
                    });
                }
            }
        }

        pending = deferred;
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    if !pending.is_empty() {
        errors.extend(classify_stalled(&pending, &failed));
    }

    // Partial wiring: every slot whose capability was built gets bound
    let mut bound = 0;
    for requirement in requirements {
        let capability = requirement.capability;
        if !injector.contains(&capability) {
            continue;
        }
        if (requirement.binder)(&injector) {
            bound += 1;
        } else {
            warn!("Slot for {capability} was already bound, keeping its value");
        }
    }

    if errors.is_empty() {
        info!(
            "Resolution succeeded: {} capabilities built, {} slots bound",
            injector.len(),
            bound
        );
    } else {
        warn!(
            "Resolution finished with {} error(s), {} slots bound",
            errors.len(),
            bound
        );
    }

    errors
}

fn build(plan: Plan, injector: &Injector, collector: Option<&Collector>) -> Result<Option<Instance>> {
    let Plan {
        capability,
        provisions,
    } = plan;

    match capability.cardinality() {
        Cardinality::Single => match provisions.into_iter().next() {
            Some(provision) => (provision.factory)(injector).map(Some),
            None => Ok(None),
        },
        Cardinality::Collection => {
            let mut items = Vec::with_capacity(provisions.len());
            for provision in provisions {
                items.push((provision.factory)(injector)?);
            }
            Ok(collector.map(|collect| collect(items)))
        }
    }
}

/// Split plans left over after the fixed point into those blocked by a
/// failed capability and those waiting on each other.
fn classify_stalled(pending: &[Plan], failed: &HashSet<Capability>) -> Vec<Error> {
    let mut errors = Vec::new();
    let mut doomed: HashSet<Capability> = HashSet::new();

    loop {
        let mut changed = false;
        for plan in pending {
            if doomed.contains(&plan.capability) {
                continue;
            }
            let blocker = plan
                .dependencies()
                .find(|d| failed.contains(*d) || doomed.contains(*d))
                .copied();
            if let Some(dependency) = blocker {
                errors.push(Error::DependencyNotResolved {
                    capability: plan.capability,
                    dependency,
                });
                doomed.insert(plan.capability);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let cyclic: Vec<Capability> = pending
        .iter()
        .map(|plan| plan.capability)
        .filter(|capability| !doomed.contains(capability))
        .collect();
    if !cyclic.is_empty() {
        warn!("Cyclic dependency between {} capabilities", cyclic.len());
        errors.push(Error::CyclicDependency {
            capabilities: cyclic,
        });
    }

    errors
}
