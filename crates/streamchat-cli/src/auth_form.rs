//! Login and registration form.

use streamchat_auth::{LoginRequest, RegisterRequest};

use crate::input::LineEditor;

/// Which form is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Email and password.
    #[default]
    Login,
    /// Name, email, password and confirmation.
    Register,
}

/// A form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Display name (registration only).
    FullName,
    /// Email address.
    Email,
    /// Password.
    Password,
    /// Password confirmation (registration only).
    Confirm,
}

impl Field {
    /// Label shown next to the field.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FullName => "Name",
            Self::Email => "Email",
            Self::Password => "Password",
            Self::Confirm => "Confirm",
        }
    }

    /// Returns `true` if the value is masked on screen.
    #[must_use]
    pub const fn is_secret(self) -> bool {
        matches!(self, Self::Password | Self::Confirm)
    }
}

/// What submitting the form produced.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Log in.
    Login(LoginRequest),
    /// Create an account.
    Register(RegisterRequest),
}

/// State of the authentication screen.
#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    mode: AuthMode,
    focus: usize,
    full_name: LineEditor,
    email: LineEditor,
    password: LineEditor,
    confirm: LineEditor,
    /// Feedback line under the form.
    pub message: Option<String>,
}

impl AuthForm {
    /// Login form with `email` prefilled.
    #[must_use]
    pub fn login(email: Option<&str>) -> Self {
        Self {
            email: email.map(LineEditor::with_text).unwrap_or_default(),
            focus: usize::from(email.is_some()),
            ..Self::default()
        }
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Fields of the current mode, in display order.
    #[must_use]
    pub const fn fields(&self) -> &'static [Field] {
        match self.mode {
            AuthMode::Login => &[Field::Email, Field::Password],
            AuthMode::Register => &[Field::FullName, Field::Email, Field::Password, Field::Confirm],
        }
    }

    /// Field that has focus.
    #[must_use]
    pub fn focused(&self) -> Field {
        let fields = self.fields();
        fields[self.focus.min(fields.len() - 1)]
    }

    /// Editor behind a field.
    #[must_use]
    pub const fn editor(&self, field: Field) -> &LineEditor {
        match field {
            Field::FullName => &self.full_name,
            Field::Email => &self.email,
            Field::Password => &self.password,
            Field::Confirm => &self.confirm,
        }
    }

    /// Editor of the focused field.
    pub fn focused_editor(&mut self) -> &mut LineEditor {
        match self.focused() {
            Field::FullName => &mut self.full_name,
            Field::Email => &mut self.email,
            Field::Password => &mut self.password,
            Field::Confirm => &mut self.confirm,
        }
    }

    /// Move focus to the next field, wrapping around.
    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % self.fields().len();
    }

    /// Move focus to the previous field, wrapping around.
    pub fn prev_field(&mut self) {
        let len = self.fields().len();
        self.focus = (self.focus + len - 1) % len;
    }

    /// Switch between login and registration, keeping the email.
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
        self.focus = 0;
        self.password.clear();
        self.confirm.clear();
        self.message = None;
    }

    /// Validate the form and build the request.
    ///
    /// # Errors
    ///
    /// Returns a message for the user if a field is missing or the passwords differ.
    pub fn submit(&self) -> Result<Submission, String> {
        let email = self.email.as_str().trim();
        let password = self.password.as_str().trim();

        if email.is_empty() || !email.contains('@') {
            return Err("Enter a valid email address.".to_string());
        }
        if password.is_empty() {
            return Err("Enter a password.".to_string());
        }

        match self.mode {
            AuthMode::Login => Ok(Submission::Login(LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })),
            AuthMode::Register => {
                if password != self.confirm.as_str().trim() {
                    return Err("Passwords do not match.".to_string());
                }
                Ok(Submission::Register(RegisterRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                    full_name: self.full_name.as_str().trim().to_string(),
                }))
            }
        }
    }
}
