use crate::Notebook;

/// Appended to the default notebook's name in the selection list.
pub const DEFAULT_NOTEBOOK_SUFFIX: &str = " (default)";

/// Notebook select options in the order the remote service listed them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotebookChoices {
    pub options: Vec<(String, String)>,
    pub default_guid: Option<String>,
}

impl NotebookChoices {
    pub fn from_notebooks(notebooks: &[Notebook]) -> Self {
        let mut choices = Self::default();
        for notebook in notebooks {
            let label = if notebook.is_default {
                choices.default_guid = Some(notebook.guid.clone());
                format!("{}{DEFAULT_NOTEBOOK_SUFFIX}", notebook.name)
            } else {
                notebook.name.clone()
            };
            choices.options.push((notebook.guid.clone(), label));
        }
        choices
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.options.iter().any(|(g, _)| g == guid)
    }

    pub fn label_for(&self, guid: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(g, _)| g == guid)
            .map(|(_, label)| label.as_str())
    }
}

/// Rows shown by the host before the user confirms the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: Vec<(&'static str, String)>,
}

impl ExportSummary {
    pub fn new(username: &str, note_title: &str, notebook_label: &str) -> Self {
        Self {
            rows: vec![
                ("Evernote Username", username.to_string()),
                ("Note Title", note_title.to_string()),
                ("Notebook", notebook_label.to_string()),
            ],
        }
    }
}
