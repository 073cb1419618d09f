use crate::GlossaryIndex;
use tracing::{debug, info};

/// Result of a key press on a section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyActivation {
    /// The key activated the header; carries the new expanded flag.
    Toggled(bool),
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccordionSection {
    id: String,
    heading: String,
    expanded: bool,
}

impl AccordionSection {
    pub fn new(id: impl Into<String>, heading: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            heading: heading.into(),
            expanded: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn heading(&self) -> &str {
        &self.heading
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Value for the header's `aria-expanded` attribute.
    pub fn aria_expanded(&self) -> &'static str {
        if self.expanded { "true" } else { "false" }
    }

    fn toggle(&mut self) -> bool {
        self.expanded = !self.expanded;
        if self.expanded {
            debug!(section = %self.id, heading = %self.heading, "accordion opened");
        } else {
            debug!(section = %self.id, heading = %self.heading, "accordion closed");
        }
        self.expanded
    }
}

/// Independent sections; toggling one never touches another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accordion {
    sections: Vec<AccordionSection>,
}

impl Accordion {
    /// All sections start collapsed.
    pub fn new(sections: impl IntoIterator<Item = AccordionSection>) -> Self {
        let sections: Vec<_> = sections
            .into_iter()
            .map(|mut section| {
                section.expanded = false;
                section
            })
            .collect();
        info!(sections = sections.len(), "accordion initialised");
        Self { sections }
    }

    /// One section per glossary entry, keyed by slug.
    pub fn from_glossary() -> Self {
        Self::new(
            GlossaryIndex::entries().map(|entry| AccordionSection::new(entry.slug(), entry.term())),
        )
    }

    /// Expands the listed sections; unknown ids are ignored.
    pub fn with_expanded<'a>(mut self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        for id in ids {
            if let Some(section) = self.section_mut(id) {
                section.expanded = true;
            }
        }
        self
    }

    pub fn sections(&self) -> &[AccordionSection] {
        &self.sections
    }

    pub fn section(&self, id: &str) -> Option<&AccordionSection> {
        self.sections.iter().find(|section| section.id == id)
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.section(id).is_some_and(AccordionSection::is_expanded)
    }

    pub fn aria_expanded(&self, id: &str) -> Option<&'static str> {
        self.section(id).map(AccordionSection::aria_expanded)
    }

    /// Pointer activation. Returns the new state, or `None` for an unknown section.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        self.section_mut(id).map(AccordionSection::toggle)
    }

    /// Keyboard activation: Enter and Space behave exactly like a click.
    pub fn activate_key(&mut self, id: &str, key: &str) -> KeyActivation {
        match key {
            "Enter" | " " | "Space" | "Spacebar" => match self.toggle(id) {
                Some(expanded) => KeyActivation::Toggled(expanded),
                None => KeyActivation::Ignored,
            },
            _ => KeyActivation::Ignored,
        }
    }

    pub fn expanded_ids(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .filter(|section| section.expanded)
            .map(|section| section.id.as_str())
    }

    fn section_mut(&mut self, id: &str) -> Option<&mut AccordionSection> {
        self.sections.iter_mut().find(|section| section.id == id)
    }
}
