//! Conversion of documents and flags into script values
//!
//! Every object and array allocated here is registered with the caller's
//! [`ResourceSet`] immediately after allocation, before any of its children
//! are converted, so a failure halfway through a document never leaves an
//! untracked handle behind.

use rquickjs::{Array, Ctx, Object, Value};
use sluice_shared::{DocumentSource, FlagSet, Record, RecordValue, ID_FIELD};
use tracing::warn;

use crate::error::{FaultKind, FilterFault};
use crate::metrics;
use crate::resources::ResourceSet;
use crate::runtime::take_exception;

/// Tracking scope for values allocated in one script context
pub type ScriptResources<'js> = ResourceSet<Value<'js>>;

fn new_object<'js>(
    ctx: &Ctx<'js>,
    resources: &mut ScriptResources<'js>,
) -> rquickjs::Result<Object<'js>> {
    let obj = Object::new(ctx.clone())?;
    resources.track(obj.clone().into_value());
    Ok(obj)
}

fn new_array<'js>(
    ctx: &Ctx<'js>,
    resources: &mut ScriptResources<'js>,
) -> rquickjs::Result<Array<'js>> {
    let arr = Array::new(ctx.clone())?;
    resources.track(arr.clone().into_value());
    Ok(arr)
}

fn string_value<'js>(ctx: &Ctx<'js>, s: &str) -> rquickjs::Result<Value<'js>> {
    Ok(rquickjs::String::from_str(ctx.clone(), s)?.into_value())
}

/// Convert one record value, recursing into maps and lists.
pub fn to_script_value<'js>(
    ctx: &Ctx<'js>,
    value: &RecordValue,
    resources: &mut ScriptResources<'js>,
) -> rquickjs::Result<Value<'js>> {
    match value {
        RecordValue::Null => Ok(Value::new_null(ctx.clone())),
        RecordValue::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        RecordValue::Integer(i) => match i32::try_from(*i) {
            Ok(small) => Ok(Value::new_int(ctx.clone(), small)),
            // Scripts only have doubles past 32 bits; precision loss above 2^53 is accepted.
            Err(_) => Ok(Value::new_float(ctx.clone(), *i as f64)),
        },
        RecordValue::Float(f) => Ok(Value::new_float(ctx.clone(), *f)),
        RecordValue::String(s) => string_value(ctx, s),
        RecordValue::Map(map) => {
            let obj = new_object(ctx, resources)?;
            populate(ctx, &obj, map, resources)?;
            Ok(obj.into_value())
        }
        RecordValue::List(items) => {
            let arr = new_array(ctx, resources)?;
            for (index, item) in items.iter().enumerate() {
                arr.set(index, to_script_value(ctx, item, resources)?)?;
            }
            Ok(arr.into_value())
        }
        RecordValue::Date(_) | RecordValue::Blob(_) => {
            let repr = value.opaque_repr().unwrap_or_default();
            string_value(ctx, &repr)
        }
    }
}

fn populate<'js>(
    ctx: &Ctx<'js>,
    obj: &Object<'js>,
    fields: &Record,
    resources: &mut ScriptResources<'js>,
) -> rquickjs::Result<()> {
    for (key, value) in fields {
        obj.set(key.as_str(), to_script_value(ctx, value, resources)?)?;
    }
    Ok(())
}

/// Convert a whole document, adding `_id` when the body lacks one.
pub fn document_to_script<'js>(
    ctx: &Ctx<'js>,
    doc: &dyn DocumentSource,
    resources: &mut ScriptResources<'js>,
) -> Result<Value<'js>, FilterFault> {
    let marshal_fault = |message: String| FilterFault::Marshal {
        id: doc.id().to_string(),
        message,
    };

    let fields = doc
        .read_fields()
        .map_err(|e| marshal_fault(e.to_string()))?;

    let build = |scope: &mut ScriptResources<'js>| -> rquickjs::Result<Value<'js>> {
        let obj = new_object(ctx, scope)?;
        populate(ctx, &obj, &fields, scope)?;
        if !fields.contains_key(ID_FIELD) {
            obj.set(ID_FIELD, doc.id())?;
        }
        Ok(obj.into_value())
    };

    // A half-built document must be released before the caller allocates the stub.
    let mut scope = resources.child();
    match build(&mut scope) {
        Ok(value) => {
            resources.absorb(scope);
            Ok(value)
        }
        Err(e) => {
            let message = take_exception(ctx, e).message;
            scope.release_all();
            Err(marshal_fault(message))
        }
    }
}

/// Object holding nothing but the document identifier
pub fn stub_document<'js>(
    ctx: &Ctx<'js>,
    id: &str,
    resources: &mut ScriptResources<'js>,
) -> rquickjs::Result<Value<'js>> {
    let obj = new_object(ctx, resources)?;
    obj.set(ID_FIELD, id)?;
    Ok(obj.into_value())
}

/// Convert a document, degrading to a stub with only `_id` if the body
/// cannot be read or converted.
pub fn document_or_stub<'js>(
    ctx: &Ctx<'js>,
    doc: &dyn DocumentSource,
    resources: &mut ScriptResources<'js>,
) -> Result<Value<'js>, FilterFault> {
    match document_to_script(ctx, doc, resources) {
        Ok(value) => Ok(value),
        Err(fault) => {
            warn!("{}; filtering a stub with only {}", fault, ID_FIELD);
            metrics::record_fault(FaultKind::Marshal);
            stub_document(ctx, doc.id(), resources)
                .map_err(|e| FilterFault::Infrastructure(take_exception(ctx, e).message))
        }
    }
}

/// `{ deleted, accessRemoved }`
pub fn flags_to_script<'js>(
    ctx: &Ctx<'js>,
    flags: FlagSet,
    resources: &mut ScriptResources<'js>,
) -> rquickjs::Result<Value<'js>> {
    let obj = new_object(ctx, resources)?;
    obj.set("deleted", flags.deleted())?;
    obj.set("accessRemoved", flags.access_removed())?;
    Ok(obj.into_value())
}
