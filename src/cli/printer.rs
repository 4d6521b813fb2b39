// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Printing of the objects a command changed.

use crate::domain::workload::kinds::ResourceMapping;
use crate::shared::error::{KruiseError, Result};
use kube::api::DynamicObject;
use std::cell::Cell;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DryRunStrategy {
    #[default]
    None,
    Client,
    Server,
}

impl DryRunStrategy {
    fn suffix(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Client => " (dry run)",
            Self::Server => " (server dry run)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
    Name,
    Default,
}

impl OutputFormat {
    pub fn parse(output: Option<&str>) -> Result<Self> {
        match output.unwrap_or("") {
            "" => Ok(Self::Default),
            "yaml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "name" => Ok(Self::Name),
            other => Err(KruiseError::usage(format!(
                "unable to match a printer suitable for the output format \"{}\", allowed formats are: json,name,yaml",
                other
            ))),
        }
    }
}

pub struct ObjectPrinter {
    format: OutputFormat,
    operation: String,
    /// Objects printed so far; YAML documents after the first get a `---`.
    printed: Cell<usize>,
}

impl ObjectPrinter {
    /// `operation` is the past tense verb of the default message, e.g.
    /// `approved`.
    pub fn new(output: Option<&str>, operation: &str, dry_run: DryRunStrategy) -> Result<Self> {
        Ok(Self {
            format: OutputFormat::parse(output)?,
            operation: format!("{}{}", operation, dry_run.suffix()),
            printed: Cell::new(0),
        })
    }

    pub fn print(
        &self,
        mapping: &ResourceMapping,
        object: &DynamicObject,
        out: &mut dyn Write,
    ) -> Result<()> {
        let name = object.metadata.name.as_deref().unwrap_or_default();
        match self.format {
            OutputFormat::Yaml => {
                if self.printed.get() > 0 {
                    out.write_all(b"---\n")?;
                }
                out.write_all(serde_yaml::to_string(object)?.as_bytes())?;
            }
            OutputFormat::Json => {
                writeln!(out, "{}", serde_json::to_string_pretty(object)?)?;
            }
            OutputFormat::Name => {
                writeln!(out, "{}/{}", mapping.qualified_kind(), name)?;
            }
            OutputFormat::Default => {
                writeln!(out, "{}/{} {}", mapping.qualified_kind(), name, self.operation)?;
            }
        }
        self.printed.set(self.printed.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloneset() -> (ResourceMapping, DynamicObject) {
        let mapping = ResourceMapping::lookup("clone").unwrap();
        let obj = DynamicObject::new("sample", &mapping.resource).within("default");
        (mapping, obj)
    }

    fn render(output: Option<&str>, dry_run: DryRunStrategy) -> String {
        let (mapping, obj) = cloneset();
        let printer = ObjectPrinter::new(output, "resource requirements updated", dry_run).unwrap();
        let mut buf = Vec::new();
        printer.print(&mapping, &obj, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_default_message() {
        assert_eq!(
            render(None, DryRunStrategy::None),
            "cloneset.apps.kruise.io/sample resource requirements updated\n"
        );
        assert_eq!(
            render(None, DryRunStrategy::Client),
            "cloneset.apps.kruise.io/sample resource requirements updated (dry run)\n"
        );
        assert_eq!(
            render(None, DryRunStrategy::Server),
            "cloneset.apps.kruise.io/sample resource requirements updated (server dry run)\n"
        );
    }

    #[test]
    fn test_structured_formats() {
        assert_eq!(
            render(Some("name"), DryRunStrategy::Client),
            "cloneset.apps.kruise.io/sample\n"
        );

        let yaml = render(Some("yaml"), DryRunStrategy::None);
        assert!(yaml.contains("kind: CloneSet"));
        assert!(yaml.contains("name: sample"));

        let json: serde_json::Value =
            serde_json::from_str(&render(Some("json"), DryRunStrategy::None)).unwrap();
        assert_eq!(json["apiVersion"], "apps.kruise.io/v1alpha1");
    }

    #[test]
    fn test_yaml_documents_are_separated() {
        let (mapping, obj) = cloneset();
        let printer = ObjectPrinter::new(Some("yaml"), "approved", DryRunStrategy::None).unwrap();
        let mut buf = Vec::new();
        printer.print(&mapping, &obj, &mut buf).unwrap();
        printer.print(&mapping, &obj, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();

        assert!(!out.starts_with("---"));
        assert_eq!(out.matches("---\n").count(), 1);
        assert_eq!(out.matches("name: sample").count(), 2);
    }

    #[test]
    fn test_unknown_format() {
        let err = OutputFormat::parse(Some("wide")).err().unwrap();
        assert!(err
            .to_string()
            .starts_with("unable to match a printer suitable for the output format \"wide\""));
    }
}
