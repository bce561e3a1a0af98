//! Compilation stage: compile the interface definition to a JSON descriptor

use crate::storage::CacheStore;
use anyhow::{anyhow, Context};
use log::debug;
use prost_types::field_descriptor_proto::Label;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    FileDescriptorSet, ServiceDescriptorProto,
};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

/// Return the compiled JSON descriptor for `hash`, compiling
/// `<service>.proto` at the tree root on a cache miss.
///
/// The tree root doubles as the include path so imports between files in
/// the same model resolve.
pub fn ensure_compiled(
    cache: &CacheStore,
    tree: &Path,
    service: &str,
    hash: &str,
) -> anyhow::Result<Vec<u8>> {
    let path = cache.compiled_path(hash);
    if path.exists() {
        debug!("compiled descriptor cache hit for {}", hash);
        return fs::read(&path)
            .with_context(|| format!("reading compiled descriptor {}", path.display()));
    }

    let entry = format!("{service}.proto");
    let set = protox::compile([entry.as_str()], [tree])
        .map_err(|e| anyhow!("compiling {}: {}", entry, e))?;
    let bytes =
        serde_json::to_vec(&descriptor_json(&set)).context("serializing compiled descriptor")?;
    CacheStore::write_atomic(&path, &bytes)?;
    Ok(bytes)
}

fn descriptor_json(set: &FileDescriptorSet) -> Value {
    json!({
        "files": set.file.iter().map(file_json).collect::<Vec<_>>(),
    })
}

fn file_json(file: &FileDescriptorProto) -> Value {
    json!({
        "name": file.name(),
        "package": file.package(),
        "messages": file.message_type.iter().map(message_json).collect::<Vec<_>>(),
        "enums": file.enum_type.iter().map(enum_json).collect::<Vec<_>>(),
        "services": file.service.iter().map(service_json).collect::<Vec<_>>(),
    })
}

fn message_json(message: &DescriptorProto) -> Value {
    json!({
        "name": message.name(),
        "fields": message.field.iter().map(field_json).collect::<Vec<_>>(),
        "nested": message.nested_type.iter().map(message_json).collect::<Vec<_>>(),
    })
}

fn field_json(field: &FieldDescriptorProto) -> Value {
    json!({
        "name": field.name(),
        "number": field.number(),
        "label": label_name(field.label()),
        "type": type_name(field),
    })
}

/// Message and enum fields carry their fully-qualified type name; scalars
/// report the lowercased protobuf type keyword.
fn type_name(field: &FieldDescriptorProto) -> String {
    let named = field.type_name();
    if !named.is_empty() {
        return named.to_string();
    }
    field
        .r#type()
        .as_str_name()
        .trim_start_matches("TYPE_")
        .to_ascii_lowercase()
}

fn label_name(label: Label) -> String {
    label
        .as_str_name()
        .trim_start_matches("LABEL_")
        .to_ascii_lowercase()
}

fn enum_json(definition: &EnumDescriptorProto) -> Value {
    json!({
        "name": definition.name(),
        "values": definition
            .value
            .iter()
            .map(|value| json!({ "name": value.name(), "number": value.number() }))
            .collect::<Vec<_>>(),
    })
}

fn service_json(service: &ServiceDescriptorProto) -> Value {
    json!({
        "name": service.name(),
        "methods": service
            .method
            .iter()
            .map(|method| json!({
                "name": method.name(),
                "inputType": method.input_type(),
                "outputType": method.output_type(),
                "clientStreaming": method.client_streaming(),
                "serverStreaming": method.server_streaming(),
            }))
            .collect::<Vec<_>>(),
    })
}
