use include_dir::{include_dir, Dir};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tera::{Context, Error as TeraError, Tera};

/// Prompts shipped with the crate, so the binary runs from any directory
static PROMPTS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    tera.render("inline_template", &context)
}

/// Render a bundled prompt by name, or any other template file from disk
pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();
    let bundled = PROMPTS_DIR
        .get_file(&template_path)
        .and_then(|file| file.contents_utf8());

    let template_content = match bundled {
        Some(content) => content.to_string(),
        None if template_path.exists() => fs::read_to_string(&template_path)
            .map_err(|e| TeraError::chain("Failed to read template file", e))?,
        None => {
            return Err(TeraError::msg(format!(
                "Prompt template not found: {}",
                template_path.display()
            )));
        }
    };
    load_prompt(&template_content, context_data)
}
