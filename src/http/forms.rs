use std::collections::BTreeMap;
use std::io::Cursor;

use axum::extract::Multipart;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationErrors};

use crate::http::AppError;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const EMPTY_FILE: &str = "The submitted file is empty.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// Field name to messages. Form-wide messages live under `non_field`.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&ValidationErrors> for FormErrors {
    fn from(errors: &ValidationErrors) -> Self {
        let mut out = FormErrors::default();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", error.code));
                out.add(&field.to_string(), message);
            }
        }
        out
    }
}

fn validation_errors(form: &impl Validate) -> FormErrors {
    match form.validate() {
        Ok(()) => FormErrors::default(),
        Err(errors) => FormErrors::from(&errors),
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Raw create/edit submission as it came off the multipart body.
#[derive(Debug, Default, Validate)]
pub struct PostSubmission {
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
    pub group: String,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct CleanPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<ImageUpload>,
}

impl PostSubmission {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut submission = PostSubmission::default();

        while let Some(field) = multipart.next_field().await.map_err(|err| {
            tracing::warn!(error = %err, "failed to read multipart field");
            AppError::bad_request("invalid form data")
        })? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|_| AppError::bad_request("invalid text field"))?;
                    submission.text = text.trim().to_string();
                }
                "group" => {
                    submission.group = field
                        .text()
                        .await
                        .map_err(|_| AppError::bad_request("invalid group field"))?;
                }
                "image" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|_| AppError::bad_request("invalid image upload"))?;
                    // Browsers send an empty part when no file was picked.
                    if !file_name.is_empty() || !bytes.is_empty() {
                        let file_name = if file_name.is_empty() {
                            "image".to_string()
                        } else {
                            file_name
                        };
                        submission.image = Some(ImageUpload { file_name, bytes });
                    }
                }
                _ => {}
            }
        }

        Ok(submission)
    }

    /// Checks everything that needs no database. Group existence is left to the caller.
    pub fn clean(self) -> Result<CleanPost, (FormErrors, PostSubmission)> {
        let mut errors = validation_errors(&self);

        let group_id = match self.group.trim() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            },
        };

        if let Some(image) = &self.image {
            if let Err(message) = check_image(image) {
                errors.add("image", message);
            }
        }

        if !errors.is_empty() {
            return Err((errors, self));
        }

        Ok(CleanPost {
            text: self.text,
            group_id,
            image: self.image,
        })
    }
}

/// Reads the header only: the format must be recognised and the dimensions non-zero.
fn check_image(image: &ImageUpload) -> Result<(), &'static str> {
    if image.bytes.is_empty() {
        return Err(EMPTY_FILE);
    }
    let reader = image::ImageReader::new(Cursor::new(image.bytes.as_ref()))
        .with_guessed_format()
        .map_err(|_| INVALID_IMAGE)?;
    if reader.format().is_none() {
        return Err(INVALID_IMAGE);
    }
    match reader.into_dimensions() {
        Ok((width, height)) if width > 0 && height > 0 => Ok(()),
        _ => Err(INVALID_IMAGE),
    }
}

/// What the create/edit template sees as `form`.
#[derive(Debug, Default, Serialize)]
pub struct PostFormView {
    pub text: String,
    pub group: Option<i64>,
    pub image: Option<String>,
    pub errors: FormErrors,
}

impl PostFormView {
    pub fn rejected(submission: &PostSubmission, errors: FormErrors, image: Option<String>) -> Self {
        Self {
            text: submission.text.clone(),
            group: submission.group.trim().parse().ok(),
            image,
            errors,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
}

impl CommentForm {
    pub fn clean(mut self) -> Result<String, FormErrors> {
        self.text = self.text.trim().to_string();
        let errors = validation_errors(&self);
        if errors.is_empty() {
            Ok(self.text)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct CommentFormView {
    pub text: String,
    pub errors: FormErrors,
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct SignupForm {
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: String,
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 150,
        message = "Required. 150 characters or fewer. Letters, digits and @/./+/-/_ only."
    ))]
    pub username: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(
        min = 8,
        message = "This password is too short. It must contain at least 8 characters."
    ))]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl SignupForm {
    pub fn check(&mut self) -> FormErrors {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.username = self.username.trim().to_string();

        let mut errors = validation_errors(&*self);
        if !self.username.is_empty() && !valid_username(&self.username) {
            errors.add("username", INVALID_USERNAME);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        } else if self.password1 != self.password2 {
            errors.add("password2", PASSWORD_MISMATCH);
        }
        errors
    }

    /// One entry per input, in display order.
    pub fn fields(&self, errors: &FormErrors) -> Vec<FieldView> {
        let field = |name: &'static str, label, input_type, value: &str, required| FieldView {
            name,
            label,
            input_type,
            value: value.to_string(),
            required,
            errors: errors.get(name).to_vec(),
        };
        vec![
            field("first_name", "First name", "text", &self.first_name, false),
            field("last_name", "Last name", "text", &self.last_name, false),
            field("username", "Username", "text", &self.username, true),
            field(
                "email",
                "Email address",
                "email",
                self.email.as_deref().unwrap_or_default(),
                false,
            ),
            field("password1", "Password", "password", "", true),
            field("password2", "Password confirmation", "password", "", true),
        ]
    }
}

fn valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
}

#[derive(Debug, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub input_type: &'static str,
    pub value: String,
    pub required: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub next: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct LoginFormView {
    pub username: String,
    pub errors: FormErrors,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x01\x00\x01\x00\x00\x00\x00\x21\xf9\x04\x01\x0a\x00\x01\x00\x2c\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02\x4c\x01\x00\x3b";

    fn submission(text: &str, group: &str, image: Option<&[u8]>) -> PostSubmission {
        PostSubmission {
            text: text.to_string(),
            group: group.to_string(),
            image: image.map(|bytes| ImageUpload {
                file_name: "small.gif".to_string(),
                bytes: Bytes::copy_from_slice(bytes),
            }),
        }
    }

    #[test]
    fn post_requires_text() {
        let (errors, _) = submission("", "", None).clean().unwrap_err();
        assert_eq!(errors.get("text"), [REQUIRED.to_string()]);
    }

    #[test]
    fn post_group_must_be_an_id() {
        let (errors, _) = submission("hello", "books", None).clean().unwrap_err();
        assert_eq!(errors.get("group"), [INVALID_CHOICE.to_string()]);

        let clean = submission("hello", "7", None).clean().unwrap();
        assert_eq!(clean.group_id, Some(7));
        let clean = submission("hello", "", None).clean().unwrap();
        assert_eq!(clean.group_id, None);
    }

    #[test]
    fn post_image_must_decode() {
        let clean = submission("hello", "", Some(SMALL_GIF)).clean().unwrap();
        assert!(clean.image.is_some());

        let (errors, _) = submission("hello", "", Some(b"not an image"))
            .clean()
            .unwrap_err();
        assert_eq!(errors.get("image"), [INVALID_IMAGE.to_string()]);
    }

    #[test]
    fn comment_text_is_trimmed_and_required() {
        let form = CommentForm {
            text: "  nice  ".to_string(),
        };
        assert_eq!(form.clean().unwrap(), "nice");

        let form = CommentForm {
            text: "   ".to_string(),
        };
        assert_eq!(form.clean().unwrap_err().get("text"), [REQUIRED.to_string()]);
    }

    fn signup(username: &str, password1: &str, password2: &str) -> SignupForm {
        SignupForm {
            username: username.to_string(),
            password1: password1.to_string(),
            password2: password2.to_string(),
            ..SignupForm::default()
        }
    }

    #[test]
    fn signup_accepts_a_well_formed_account() {
        let mut form = signup("leo.tolstoy", "war-and-peace", "war-and-peace");
        form.email = Some("leo@example.com".to_string());
        assert!(form.check().is_empty());
    }

    #[test]
    fn signup_reports_each_broken_field() {
        let mut form = signup("bad name!", "short", "other");
        form.email = Some("not-an-email".to_string());
        let errors = form.check();

        assert_eq!(errors.get("username"), [INVALID_USERNAME.to_string()]);
        assert_eq!(errors.get("password2"), [PASSWORD_MISMATCH.to_string()]);
        assert_eq!(errors.get("email").len(), 1);
        assert_eq!(errors.get("password1").len(), 1);
    }

    #[test]
    fn signup_fields_keep_values_but_not_passwords() {
        let mut form = signup("leo", "secret-pass", "secret-pass");
        let errors = form.check();
        let fields = form.fields(&errors);

        assert_eq!(fields.len(), 6);
        assert_eq!(fields[2].name, "username");
        assert_eq!(fields[2].value, "leo");
        assert!(fields[4].value.is_empty());
    }
}
