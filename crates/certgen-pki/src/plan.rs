//! Build plan and dependency ordering.

use certgen_types::{CaKind, CertgenError, EtcdKind, KubeConfigKind, LeafKind, Result};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

/// One unit of work in a bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    /// Create a self-signed CA
    Ca(CaKind),
    /// Issue a master leaf certificate
    Leaf(LeafKind),
    /// Issue an etcd certificate
    Etcd(EtcdKind),
    /// Assemble a kubeconfig
    KubeConfig(KubeConfigKind),
    /// Generate the session authentication and encryption secrets
    MasterSecrets,
    /// Generate the service account signing keypair
    ServiceAccountKey,
}

impl Step {
    /// Steps that must complete before this one.
    pub fn dependencies(&self) -> Vec<Step> {
        match self {
            Step::Ca(_) | Step::MasterSecrets | Step::ServiceAccountKey => Vec::new(),
            Step::Leaf(kind) => vec![Step::Ca(kind.signer())],
            Step::Etcd(_) => vec![Step::Ca(CaKind::Etcd)],
            Step::KubeConfig(kind) => vec![Step::Ca(CaKind::Master), Step::Leaf(kind.client())],
        }
    }

    /// Error reported when this step is needed but not planned.
    fn missing(&self) -> CertgenError {
        match self {
            Step::Ca(kind) => CertgenError::UnknownSigner(kind.path().to_string()),
            other => CertgenError::MissingCredential(other.to_string()),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Ca(kind) => write!(f, "{}", kind),
            Step::Leaf(kind) => write!(f, "{}", kind),
            Step::Etcd(kind) => write!(f, "{}", kind),
            Step::KubeConfig(kind) => write!(f, "{}", kind),
            Step::MasterSecrets => f.write_str("master secrets"),
            Step::ServiceAccountKey => f.write_str("etc/origin/master/serviceaccounts"),
        }
    }
}

/// Ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    steps: Vec<Step>,
}

impl BuildPlan {
    /// An empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every CA, master leaf and etcd certificate.
    pub fn certificates() -> Self {
        let mut plan = Self::new();
        plan.extend(CaKind::ALL.into_iter().map(Step::Ca));
        plan.extend(LeafKind::ALL.into_iter().map(Step::Leaf));
        plan.extend(EtcdKind::ALL.into_iter().map(Step::Etcd));
        plan
    }

    /// Everything a master needs, including the node bootstrap kubeconfig.
    pub fn master() -> Self {
        let mut plan = Self::certificates();
        plan.extend(KubeConfigKind::MASTER.into_iter().map(Step::KubeConfig));
        plan.add(Step::KubeConfig(KubeConfigKind::NodeBootstrap));
        plan.add(Step::MasterSecrets);
        plan.add(Step::ServiceAccountKey);
        plan
    }

    /// Append a step; steps already planned are ignored.
    pub fn add(&mut self, step: Step) {
        if !self.steps.contains(&step) {
            self.steps.push(step);
        }
    }

    /// Append several steps.
    pub fn extend(&mut self, steps: impl IntoIterator<Item = Step>) {
        for step in steps {
            self.add(step);
        }
    }

    /// Whether `step` is planned.
    pub fn contains(&self, step: Step) -> bool {
        self.steps.contains(&step)
    }

    /// Planned steps in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing is planned.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Reorder so every step follows its dependencies (depth-first
    /// topological sort). Independent steps keep their planned order.
    ///
    /// A dependency that is not planned fails with `UnknownSigner` for a CA
    /// and `MissingCredential` otherwise.
    pub fn sort_by_dependencies(&mut self) -> Result<()> {
        let order = topological_order(&self.steps, Step::dependencies, Step::missing)?;
        self.steps = order.into_iter().map(|idx| self.steps[idx]).collect();
        Ok(())
    }
}

/// Indices of `items` in dependency order.
fn topological_order<T, D, M>(items: &[T], dependencies: D, missing: M) -> Result<Vec<usize>>
where
    T: Copy + Eq + Hash + fmt::Display,
    D: Fn(&T) -> Vec<T>,
    M: Fn(&T) -> CertgenError,
{
    fn visit<T, D, M>(
        item: T,
        items: &[T],
        dependencies: &D,
        missing: &M,
        visited: &mut HashSet<T>,
        visiting: &mut HashSet<T>,
        sorted: &mut Vec<usize>,
    ) -> Result<()>
    where
        T: Copy + Eq + Hash + fmt::Display,
        D: Fn(&T) -> Vec<T>,
        M: Fn(&T) -> CertgenError,
    {
        if visited.contains(&item) {
            return Ok(());
        }

        if visiting.contains(&item) {
            return Err(CertgenError::Validation(format!(
                "Circular dependency detected involving: {}",
                item
            )));
        }

        let idx = items
            .iter()
            .position(|i| *i == item)
            .ok_or_else(|| missing(&item))?;

        visiting.insert(item);
        for dep in dependencies(&item) {
            visit(dep, items, dependencies, missing, visited, visiting, sorted)?;
        }
        visiting.remove(&item);
        visited.insert(item);
        sorted.push(idx);

        Ok(())
    }

    let mut sorted = Vec::with_capacity(items.len());
    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();

    for item in items {
        visit(
            *item,
            items,
            &dependencies,
            &missing,
            &mut visited,
            &mut visiting,
            &mut sorted,
        )?;
    }

    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(plan: &BuildPlan, step: Step) -> usize {
        plan.steps().iter().position(|s| *s == step).unwrap()
    }

    #[test]
    fn test_master_plan_is_complete() {
        let plan = BuildPlan::master();
        assert_eq!(plan.len(), 6 + 11 + 2 + 4 + 2);
        assert!(plan.contains(Step::KubeConfig(KubeConfigKind::NodeBootstrap)));
    }

    #[test]
    fn test_sort_puts_dependencies_first() {
        let mut plan = BuildPlan::new();
        plan.add(Step::KubeConfig(KubeConfigKind::Admin));
        plan.add(Step::Etcd(EtcdKind::Peer));
        plan.add(Step::Leaf(LeafKind::Admin));
        plan.add(Step::Ca(CaKind::Etcd));
        plan.add(Step::Ca(CaKind::Master));
        plan.sort_by_dependencies().unwrap();

        assert!(position(&plan, Step::Ca(CaKind::Master)) < position(&plan, Step::Leaf(LeafKind::Admin)));
        assert!(
            position(&plan, Step::Leaf(LeafKind::Admin))
                < position(&plan, Step::KubeConfig(KubeConfigKind::Admin))
        );
        assert!(position(&plan, Step::Ca(CaKind::Etcd)) < position(&plan, Step::Etcd(EtcdKind::Peer)));
        assert_eq!(plan.len(), 5);
    }

    #[test]
    fn test_sort_keeps_sorted_plan_stable() {
        let mut plan = BuildPlan::master();
        let before = plan.clone();
        plan.sort_by_dependencies().unwrap();
        assert_eq!(plan, before);
    }

    #[test]
    fn test_missing_ca_is_unknown_signer() {
        let mut plan = BuildPlan::new();
        plan.add(Step::Ca(CaKind::Master));
        plan.add(Step::Leaf(LeafKind::ServiceCatalogApiserver));

        let err = plan.sort_by_dependencies().unwrap_err();
        assert!(
            matches!(err, CertgenError::UnknownSigner(ref p) if p == "etc/origin/service-catalog/ca")
        );
    }

    #[test]
    fn test_missing_leaf_is_missing_credential() {
        let mut plan = BuildPlan::new();
        plan.add(Step::Ca(CaKind::Master));
        plan.add(Step::KubeConfig(KubeConfigKind::NodeBootstrap));

        let err = plan.sort_by_dependencies().unwrap_err();
        assert!(
            matches!(err, CertgenError::MissingCredential(ref p) if p == "etc/origin/master/node-bootstrapper")
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let items = [1u8, 2, 3];
        let err = topological_order(
            &items,
            |i| vec![if *i == 3 { 1 } else { i + 1 }],
            |i| CertgenError::MissingCredential(i.to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, CertgenError::Validation(_)));
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let mut plan = BuildPlan::new();
        plan.add(Step::MasterSecrets);
        plan.add(Step::MasterSecrets);
        assert_eq!(plan.len(), 1);
    }
}
