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

//! Turns command line resource arguments and manifest files into the list of
//! objects a command operates on.

use crate::domain::workload::kinds::{split_api_version, ResourceMapping};
use crate::infrastructure::kubernetes::client::KruiseClient;
use crate::shared::error::{KruiseError, Result};
use kube::api::{ApiResource, DynamicObject};
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

const MISSING_RESOURCES_MESSAGE: &str = "You must provide one or more resources by argument or filename.\n\
Example resource specifications include:\n   '-f rsrc.yaml'\n   '--filename=rsrc.json'\n   '<resource> <name>'\n   '<resource>'";

/// One object resolved by the builder.
#[derive(Debug, Clone)]
pub struct Info {
    pub mapping: ResourceMapping,
    pub namespace: Option<String>,
    pub name: String,
    pub object: DynamicObject,
    /// Manifest the object was read from, if any.
    pub source: Option<String>,
}

impl Info {
    /// `cloneset.apps.kruise.io/sample`
    pub fn object_name(&self) -> String {
        format!("{}/{}", self.mapping.qualified_kind(), self.name)
    }

    /// `clonesets.apps.kruise.io`
    pub fn resource_string(&self) -> String {
        let resource = &self.mapping.resource;
        if resource.group.is_empty() {
            resource.plural.clone()
        } else {
            format!("{}.{}", resource.plural, resource.group)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilenameOptions {
    pub filenames: Vec<String>,
    pub recursive: bool,
}

impl FilenameOptions {
    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ResourceRequest {
    Named { type_name: String, name: String },
    Selected { type_name: String },
}

#[derive(Debug, Clone, Default)]
pub struct ResourceBuilder {
    namespace: String,
    enforce_namespace: bool,
    filenames: FilenameOptions,
    args: Vec<String>,
    default_type: Option<String>,
    selector: Option<String>,
    all: bool,
    local: bool,
    latest: bool,
}

impl ResourceBuilder {
    pub fn new(namespace: impl Into<String>, enforce_namespace: bool) -> Self {
        Self {
            namespace: namespace.into(),
            enforce_namespace,
            ..Default::default()
        }
    }

    pub fn filenames(mut self, filenames: FilenameOptions) -> Self {
        self.filenames = filenames;
        self
    }

    pub fn resource_args(mut self, args: &[String]) -> Self {
        self.args = args.to_vec();
        self
    }

    /// Type used when a single bare name is given, as in `exec NAME`.
    pub fn default_type(mut self, type_name: impl Into<String>) -> Self {
        self.default_type = Some(type_name.into());
        self
    }

    pub fn selector(mut self, selector: Option<String>) -> Self {
        self.selector = selector.filter(|s| !s.is_empty());
        self
    }

    pub fn select_all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    /// Objects come from files only and the server is never contacted.
    pub fn local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    /// Re-read file objects from the server so mutations start from the live
    /// state.
    pub fn latest(mut self) -> Self {
        self.latest = true;
        self
    }

    pub async fn infos(&self, client: Option<&dyn KruiseClient>) -> Result<Vec<Info>> {
        if self.local && !self.args.is_empty() {
            return Err(KruiseError::usage(
                "error: you must specify resources by --filename when --local is set.\n\
                 Example resource specifications include:\n   '-f rsrc.yaml'\n   '--filename=rsrc.json'",
            ));
        }
        if self.filenames.is_empty() && self.args.is_empty() {
            return Err(KruiseError::usage(MISSING_RESOURCES_MESSAGE));
        }

        let client = if self.local {
            None
        } else {
            Some(client.ok_or_else(|| {
                KruiseError::config_error("a cluster connection is required for this command")
            })?)
        };

        let mut infos = Vec::new();
        for (source, object) in load_manifests(&self.filenames)? {
            infos.push(self.file_info(client, source, object).await?);
        }

        if let Some(client) = client {
            for request in self.resource_requests()? {
                infos.extend(self.fetch(client, request).await?);
            }
        }

        tracing::debug!("Resolved {} object(s)", infos.len());
        Ok(infos)
    }

    fn resource_requests(&self) -> Result<Vec<ResourceRequest>> {
        if self.args.is_empty() {
            return Ok(Vec::new());
        }

        if self.args.iter().all(|arg| arg.contains('/')) {
            if self.selector.is_some() {
                return Err(KruiseError::usage(
                    "name cannot be provided when a selector is specified",
                ));
            }
            return self
                .args
                .iter()
                .map(|arg| match arg.split_once('/') {
                    Some((type_name, name))
                        if !type_name.is_empty() && !name.is_empty() && !name.contains('/') =>
                    {
                        Ok(ResourceRequest::Named {
                            type_name: type_name.to_string(),
                            name: name.to_string(),
                        })
                    }
                    _ => Err(KruiseError::usage(format!(
                        "arguments in resource/name form must have a single resource and name: {}",
                        arg
                    ))),
                })
                .collect();
        }

        if self.args.iter().any(|arg| arg.contains('/')) {
            return Err(KruiseError::usage(
                "there is no need to specify a resource type as a separate argument when passing \
                 arguments in resource/name form (e.g. 'kubectl get resource/<resource_name>' instead \
                 of 'kubectl get resource resource/<resource_name>'",
            ));
        }

        if let (Some(default_type), [name]) = (&self.default_type, self.args.as_slice()) {
            return Ok(vec![ResourceRequest::Named {
                type_name: default_type.clone(),
                name: name.clone(),
            }]);
        }

        let types: Vec<&str> = self.args[0].split(',').filter(|t| !t.is_empty()).collect();
        let names = &self.args[1..];

        if names.is_empty() {
            if self.selector.is_none() && !self.all {
                return Err(KruiseError::usage(format!(
                    "resource(s) were provided, but no name was specified: {}",
                    self.args[0]
                )));
            }
            return Ok(types
                .into_iter()
                .map(|t| ResourceRequest::Selected {
                    type_name: t.to_string(),
                })
                .collect());
        }

        if self.selector.is_some() {
            return Err(KruiseError::usage(
                "name cannot be provided when a selector is specified",
            ));
        }

        Ok(types
            .iter()
            .flat_map(|t| {
                names.iter().map(move |name| ResourceRequest::Named {
                    type_name: t.to_string(),
                    name: name.clone(),
                })
            })
            .collect())
    }

    async fn resolve_type(&self, client: &dyn KruiseClient, type_name: &str) -> Result<ResourceMapping> {
        match ResourceMapping::lookup(type_name) {
            Some(mapping) => Ok(mapping),
            None => client.discover(type_name).await,
        }
    }

    fn namespace_for(&self, mapping: &ResourceMapping) -> Option<String> {
        mapping.namespaced.then(|| self.namespace.clone())
    }

    async fn fetch(&self, client: &dyn KruiseClient, request: ResourceRequest) -> Result<Vec<Info>> {
        match request {
            ResourceRequest::Named { type_name, name } => {
                let mapping = self.resolve_type(client, &type_name).await?;
                let namespace = self.namespace_for(&mapping);
                let object = client
                    .get_object(&mapping, namespace.as_deref(), &name)
                    .await?;
                Ok(vec![Info {
                    mapping,
                    namespace,
                    name,
                    object,
                    source: None,
                }])
            }
            ResourceRequest::Selected { type_name } => {
                let mapping = self.resolve_type(client, &type_name).await?;
                let namespace = self.namespace_for(&mapping);
                let objects = client
                    .list_objects(&mapping, namespace.as_deref(), self.selector.as_deref())
                    .await?;
                Ok(objects
                    .into_iter()
                    .map(|object| Info {
                        mapping: mapping.clone(),
                        namespace: namespace.clone(),
                        name: object.metadata.name.clone().unwrap_or_default(),
                        object,
                        source: None,
                    })
                    .collect())
            }
        }
    }

    async fn file_info(
        &self,
        client: Option<&dyn KruiseClient>,
        source: String,
        mut object: DynamicObject,
    ) -> Result<Info> {
        let types = object.types.clone().ok_or_else(|| {
            KruiseError::InvalidResource(format!(
                "Object 'Kind' is missing in '{}'",
                source
            ))
        })?;

        let mapping = match (ResourceMapping::lookup_gvk(&types.api_version, &types.kind), client) {
            (Some(mapping), _) => mapping,
            (None, Some(client)) => client.discover_gvk(&types.api_version, &types.kind).await?,
            (None, None) => guessed_mapping(&types.api_version, &types.kind),
        };

        let name = object.metadata.name.clone().ok_or_else(|| {
            KruiseError::InvalidResource(format!(
                "error when retrieving current configuration of {} from {}: resource name may not be empty",
                mapping.qualified_kind(),
                source
            ))
        })?;

        let namespace = if mapping.namespaced {
            match object.metadata.namespace.as_deref() {
                Some(ns) if self.enforce_namespace && ns != self.namespace => {
                    return Err(KruiseError::validation(format!(
                        "the namespace from the provided object \"{}\" does not match the namespace \"{}\". You must pass '--namespace={}' to perform this operation.",
                        ns, self.namespace, ns
                    )));
                }
                Some(ns) => Some(ns.to_string()),
                None => {
                    object.metadata.namespace = Some(self.namespace.clone());
                    Some(self.namespace.clone())
                }
            }
        } else {
            None
        };

        if let (Some(client), true) = (client, self.latest) {
            object = client
                .get_object(&mapping, namespace.as_deref(), &name)
                .await?;
        }

        Ok(Info {
            mapping,
            namespace,
            name,
            object,
            source: Some(source),
        })
    }
}

/// Best-effort mapping for kinds that cannot be looked up without a server.
fn guessed_mapping(api_version: &str, kind: &str) -> ResourceMapping {
    let (group, version) = split_api_version(api_version);
    ResourceMapping::new(
        ApiResource {
            group: group.to_string(),
            version: version.to_string(),
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            plural: format!("{}s", kind.to_lowercase()),
        },
        true,
    )
}

/// Reads every object named by `-f`, expanding directories and `List` kinds.
pub fn load_manifests(options: &FilenameOptions) -> Result<Vec<(String, DynamicObject)>> {
    let mut objects = Vec::new();
    for filename in &options.filenames {
        if filename == "-" {
            let mut content = String::new();
            std::io::stdin().read_to_string(&mut content)?;
            objects.extend(parse_manifest("STDIN", &content)?);
            continue;
        }
        if filename.starts_with("http://") || filename.starts_with("https://") {
            return Err(KruiseError::usage(format!(
                "reading manifests from URLs is not supported: {}",
                filename
            )));
        }

        let path = Path::new(filename);
        if !path.exists() {
            return Err(KruiseError::usage(format!(
                "the path \"{}\" does not exist",
                filename
            )));
        }
        for file in expand_path(path, options.recursive, true)? {
            let content = std::fs::read_to_string(&file)?;
            objects.extend(parse_manifest(&file.display().to_string(), &content)?);
        }
    }
    Ok(objects)
}

fn expand_path(path: &Path, recursive: bool, top_level: bool) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !top_level && !recursive {
        return Ok(Vec::new());
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    let mut files = Vec::new();
    for entry in entries {
        if entry.is_dir() {
            files.extend(expand_path(&entry, recursive, false)?);
        } else if entry
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
        {
            files.push(entry);
        }
    }
    Ok(files)
}

/// Parses a YAML or JSON stream that may hold several documents.
pub fn parse_manifest(source: &str, content: &str) -> Result<Vec<(String, DynamicObject)>> {
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = Value::deserialize(document).map_err(|e| {
            KruiseError::InvalidResource(format!("error parsing {}: {}", source, e))
        })?;
        collect_objects(source, value, &mut objects)?;
    }
    Ok(objects)
}

fn collect_objects(
    source: &str,
    value: Value,
    objects: &mut Vec<(String, DynamicObject)>,
) -> Result<()> {
    if value.is_null() {
        return Ok(());
    }

    let is_list = value
        .get("kind")
        .and_then(Value::as_str)
        .is_some_and(|kind| kind.ends_with("List"))
        && value.get("items").is_some_and(Value::is_array);
    if is_list {
        if let Value::Object(mut map) = value {
            if let Some(Value::Array(items)) = map.remove("items") {
                for item in items {
                    collect_objects(source, item, objects)?;
                }
            }
        }
        return Ok(());
    }

    let object: DynamicObject = serde_json::from_value(value).map_err(|e| {
        KruiseError::InvalidResource(format!("error parsing {}: {}", source, e))
    })?;
    if object.types.is_none() {
        return Err(KruiseError::InvalidResource(format!(
            "Object 'Kind' is missing in '{}'",
            source
        )));
    }
    objects.push((source.to_string(), object));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CLONESET: &str = r#"
apiVersion: apps.kruise.io/v1alpha1
kind: CloneSet
metadata:
  name: sample
spec:
  template:
    spec:
      containers:
        - name: nginx
          image: nginx
---
apiVersion: v1
kind: List
items:
  - apiVersion: apps/v1
    kind: Deployment
    metadata:
      name: web
      namespace: prod
"#;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_multi_document_manifest() {
        let objects = parse_manifest("inline", CLONESET).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].1.metadata.name.as_deref(), Some("sample"));
        assert_eq!(objects[1].1.types.as_ref().unwrap().kind, "Deployment");
    }

    #[test]
    fn test_parse_manifest_requires_kind() {
        let err = parse_manifest("bad.yaml", "metadata:\n  name: x\n").unwrap_err();
        assert!(err.to_string().contains("Object 'Kind' is missing in 'bad.yaml'"));
    }

    #[test]
    fn test_load_manifests_from_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yaml"), CLONESET).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(
            nested.join("b.json"),
            r#"{"apiVersion":"v1","kind":"Pod","metadata":{"name":"p"}}"#,
        )
        .unwrap();

        let flat = FilenameOptions {
            filenames: vec![dir.path().display().to_string()],
            recursive: false,
        };
        assert_eq!(load_manifests(&flat).unwrap().len(), 2);

        let recursive = FilenameOptions {
            recursive: true,
            ..flat
        };
        assert_eq!(load_manifests(&recursive).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_path() {
        let options = FilenameOptions {
            filenames: vec!["/nonexistent/cloneset.yaml".to_string()],
            recursive: false,
        };
        let err = load_manifests(&options).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_resource_requests() {
        let builder = ResourceBuilder::new("default", false).resource_args(&args(&["clone/a", "deploy/b"]));
        assert_eq!(
            builder.resource_requests().unwrap(),
            vec![
                ResourceRequest::Named {
                    type_name: "clone".into(),
                    name: "a".into()
                },
                ResourceRequest::Named {
                    type_name: "deploy".into(),
                    name: "b".into()
                },
            ]
        );

        let builder = ResourceBuilder::new("default", false).resource_args(&args(&["clone,deploy", "x"]));
        assert_eq!(builder.resource_requests().unwrap().len(), 2);

        let builder = ResourceBuilder::new("default", false)
            .resource_args(&args(&["clone"]))
            .select_all(true);
        assert_eq!(
            builder.resource_requests().unwrap(),
            vec![ResourceRequest::Selected {
                type_name: "clone".into()
            }]
        );

        let builder = ResourceBuilder::new("default", false)
            .resource_args(&args(&["web-0"]))
            .default_type("pods");
        assert_eq!(
            builder.resource_requests().unwrap(),
            vec![ResourceRequest::Named {
                type_name: "pods".into(),
                name: "web-0".into()
            }]
        );
    }

    #[test]
    fn test_resource_request_errors() {
        let no_name = ResourceBuilder::new("default", false).resource_args(&args(&["clone"]));
        assert!(no_name
            .resource_requests()
            .unwrap_err()
            .to_string()
            .contains("no name was specified"));

        let mixed = ResourceBuilder::new("default", false).resource_args(&args(&["clone", "clone/a"]));
        assert!(mixed
            .resource_requests()
            .unwrap_err()
            .to_string()
            .contains("no need to specify a resource type"));

        let with_selector = ResourceBuilder::new("default", false)
            .resource_args(&args(&["clone", "a"]))
            .selector(Some("app=x".to_string()));
        assert!(with_selector.resource_requests().is_err());
    }

    #[tokio::test]
    async fn test_local_rejects_arguments() {
        let builder = ResourceBuilder::new("default", false)
            .resource_args(&args(&["clone/a"]))
            .local(true);
        let err = builder.infos(None).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("error: you must specify resources by --filename when --local is set."));
    }

    #[tokio::test]
    async fn test_local_file_infos() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cloneset.yaml");
        fs::write(&path, CLONESET).unwrap();

        let infos = ResourceBuilder::new("team-a", false)
            .filenames(FilenameOptions {
                filenames: vec![path.display().to_string()],
                recursive: false,
            })
            .local(true)
            .infos(None)
            .await
            .unwrap();

        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].object_name(), "cloneset.apps.kruise.io/sample");
        assert_eq!(infos[0].namespace.as_deref(), Some("team-a"));
        assert_eq!(infos[1].namespace.as_deref(), Some("prod"));
        assert_eq!(infos[1].resource_string(), "deployments.apps");
    }

    #[tokio::test]
    async fn test_enforced_namespace_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cloneset.yaml");
        fs::write(&path, CLONESET).unwrap();

        let err = ResourceBuilder::new("team-a", true)
            .filenames(FilenameOptions {
                filenames: vec![path.display().to_string()],
                recursive: false,
            })
            .local(true)
            .infos(None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not match the namespace \"team-a\""));
    }

    #[tokio::test]
    async fn test_no_resources() {
        let err = ResourceBuilder::new("default", false)
            .local(true)
            .infos(None)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("You must provide one or more resources"));
    }
}
