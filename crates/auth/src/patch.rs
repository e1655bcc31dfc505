use super::*;

/// Partial update of a member's editable profile fields.
///
/// `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct Patch {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub stats_privacy: Option<Visibility>,
    pub ui_theme: Option<String>,
    pub color_theme: Option<String>,
}

impl Patch {
    /// Theme-only patch. Both values are required.
    pub fn theme(ui: &str, color: &str) -> Result<Self, StoreError> {
        let ui = ui.trim();
        let color = color.trim();
        if ui.is_empty() || color.is_empty() {
            return Err(StoreError::Invalid(
                "ui_theme and color_theme are required".to_string(),
            ));
        }
        Ok(Self {
            ui_theme: Some(ui.to_string()),
            color_theme: Some(color.to_string()),
            ..Self::default()
        })
    }
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.avatar_url.is_none()
            && self.stats_privacy.is_none()
            && self.ui_theme.is_none()
            && self.color_theme.is_none()
    }
    /// Normalizes the patch or rejects it before any store call.
    pub fn validate(mut self) -> Result<Self, StoreError> {
        if let Some(display) = self.display_name.take() {
            let display = display.trim();
            if display.is_empty() {
                return Err(StoreError::Invalid(
                    "display name cannot be empty or only whitespace".to_string(),
                ));
            }
            self.display_name = Some(display.to_string());
        }
        Ok(self)
    }
}
