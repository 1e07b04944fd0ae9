/// The sections of an update expression.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Clause {
    Set,
    Add,
    Delete,
    Remove,
}

impl Clause {
    const ORDER: [Self; 4] = [Self::Set, Self::Add, Self::Delete, Self::Remove];

    fn verb(self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Add => "ADD",
            Self::Delete => "DELETE",
            Self::Remove => "REMOVE",
        }
    }
}

/// Update actions accumulated per clause, rendered in a fixed order.
#[derive(Clone, Debug, Default)]
pub(crate) struct UpdateClauses {
    set: Vec<String>,
    add: Vec<String>,
    delete: Vec<String>,
    remove: Vec<String>,
}

impl UpdateClauses {
    fn actions(&self, clause: Clause) -> &[String] {
        match clause {
            Clause::Set => &self.set,
            Clause::Add => &self.add,
            Clause::Delete => &self.delete,
            Clause::Remove => &self.remove,
        }
    }

    pub(crate) fn push(&mut self, clause: Clause, action: String) {
        let actions = match clause {
            Clause::Set => &mut self.set,
            Clause::Add => &mut self.add,
            Clause::Delete => &mut self.delete,
            Clause::Remove => &mut self.remove,
        };
        actions.push(action);
    }

    #[allow(dead_code)]
    pub(crate) fn is_empty(&self) -> bool {
        Clause::ORDER
            .iter()
            .all(|clause| self.actions(*clause).is_empty())
    }

    /// `SET a, b ADD c DELETE d REMOVE e`, skipping empty sections.
    pub(crate) fn render(&self) -> Option<String> {
        let sections: Vec<_> = Clause::ORDER
            .iter()
            .filter(|clause| !self.actions(**clause).is_empty())
            .map(|clause| format!("{} {}", clause.verb(), self.actions(*clause).join(", ")))
            .collect();
        (!sections.is_empty()).then(|| sections.join(" "))
    }
}
