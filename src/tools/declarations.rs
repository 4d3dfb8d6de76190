//! Tool declarations advertised to the reasoning engine.
//!
//! Names come from [`Operation::name`] so the declarations and the
//! dispatcher table cannot drift apart.

use serde::Serialize;

use super::Operation;

/// A function the model may call, with a JSON Schema for its arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDeclaration {
    pub fn for_operation(operation: Operation) -> Self {
        let (description, parameters) = match operation {
            Operation::GetFilesInfo => (
                "Lists files in the specified directory along with their sizes, constrained to the working directory.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "directory": {
                            "type": "string",
                            "description": "The directory to list files from, relative to the working directory. If not provided, lists files in the working directory itself."
                        }
                    }
                }),
            ),
            Operation::GetFileContent => (
                "Returns the content of a file, constrained to the working directory. At most 10000 characters are returned.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "The path to the file to read, relative to the working directory."
                        }
                    },
                    "required": ["file_path"]
                }),
            ),
            Operation::WriteFile => (
                "Writes content to a file, creating it and any missing directories. Existing content is overwritten.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "The path of the file to write to, relative to the working directory."
                        },
                        "content": {
                            "type": "string",
                            "description": "The content to write to the file."
                        }
                    },
                    "required": ["file_path", "content"]
                }),
            ),
            Operation::RunPythonFile => (
                "Runs a Python file inside the working directory with optional command-line arguments and returns its output.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "The Python file to run, relative to the working directory."
                        },
                        "args": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Optional command-line arguments passed to the script."
                        }
                    },
                    "required": ["file_path"]
                }),
            ),
        };

        Self {
            name: operation.name().to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Declarations for every sandboxed operation, in table order.
pub fn sandbox_tool_declarations() -> Vec<ToolDeclaration> {
    Operation::ALL
        .iter()
        .copied()
        .map(ToolDeclaration::for_operation)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_names_match_dispatch_table() {
        let names: Vec<String> = sandbox_tool_declarations()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec!["get_files_info", "get_file_content", "write_file", "run_python_file"]
        );
        for name in &names {
            assert!(Operation::from_name(name).is_some());
        }
    }

    #[test]
    fn test_no_declaration_exposes_root() {
        for declaration in sandbox_tool_declarations() {
            assert!(declaration.parameters["properties"]
                .get(super::super::RESERVED_ROOT_KEY)
                .is_none());
        }
    }

    #[test]
    fn test_run_python_file_args_schema() {
        let declaration = ToolDeclaration::for_operation(Operation::RunPythonFile);
        let args = &declaration.parameters["properties"]["args"];
        assert_eq!(args["type"], "array");
        assert_eq!(args["items"]["type"], "string");
    }
}
