use brickbatch_core::{Model, PartId};

/// Membership set over all registered part ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActiveParts {
    active: Vec<bool>,
}

impl ActiveParts {
    /// An all-inactive set over `part_count` ids.
    pub fn new(part_count: u32) -> Self {
        Self {
            active: vec![false; part_count as usize],
        }
    }

    /// Number of registered part ids the set covers.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn contains(&self, id: PartId) -> bool {
        self.active.get(id.index()).copied().unwrap_or(false)
    }

    /// Mark `id` active. Sentinel and out-of-range ids are ignored.
    pub fn insert(&mut self, id: PartId) -> bool {
        if !id.is_valid() {
            return false;
        }
        match self.active.get_mut(id.index()) {
            Some(slot) => {
                *slot = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: PartId) {
        if let Some(slot) = self.active.get_mut(id.index()) {
            *slot = false;
        }
    }

    /// Active ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = PartId> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, &a)| a)
            .map(|(i, _)| PartId(i as u32))
    }

    pub fn count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }
}

/// Scan the instance list once and mark every referenced part.
pub fn select_active_parts(model: &Model, part_count: u32) -> ActiveParts {
    let mut active = ActiveParts::new(part_count);
    let mut skipped = 0usize;
    for instance in &model.instances {
        if !active.insert(instance.part) {
            skipped += 1;
        }
    }
    if skipped > 0 {
        log::debug!("Skipped {} instances with unresolved parts", skipped);
    }
    active
}
