//! Skill presets for task prompts.
//!
//! Each skill maps to a prompt file available inside the worker container.
//! Selecting one prefixes the task prompt with `use @<file>`.

/// A task skill preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skill {
    pub id: &'static str,
    pub label: &'static str,
    pub hint: &'static str,
    /// Prompt file name, without extension.
    pub file: &'static str,
}

pub const SKILLS: &[Skill] = &[
    Skill {
        id: "planner",
        label: "Planner",
        hint: "Strategic reasoning & multi-step planning",
        file: "auto_planning",
    },
    Skill {
        id: "data-wizard",
        label: "Data Wizard",
        hint: "Data extraction, parsing & analysis",
        file: "data_wizard",
    },
    Skill {
        id: "diagram-builder",
        label: "Diagram Builder",
        hint: "Charts, flowcharts & visualizations",
        file: "diagram_builder",
    },
    Skill {
        id: "web-researcher",
        label: "Web Researcher",
        hint: "Web scraping, browsing & research",
        file: "web_research",
    },
    Skill {
        id: "document-generator",
        label: "Doc Generator",
        hint: "Reports, docs & structured output",
        file: "document_generator",
    },
];

/// Look up a skill by id, case-insensitively.
pub fn find(id: &str) -> Option<&'static Skill> {
    SKILLS.iter().find(|s| s.id.eq_ignore_ascii_case(id.trim()))
}

impl Skill {
    /// Prefix a prompt with this skill's file reference.
    pub fn compose(&self, prompt: &str) -> String {
        format!("use @{} {}", self.file, prompt.trim())
    }
}
