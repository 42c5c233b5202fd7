use crate::domain::user::RegisterUser;
use validator::Validate;

/// Checks every rule on the form and reports all failing fields at once,
/// as `field: reason` pairs sorted by field name.
pub fn validate_registration(form: &RegisterUser) -> Result<(), String> {
    form.validate().map_err(|errors| {
        let mut failures: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, field_errors)| {
                field_errors.iter().map(move |e| {
                    let reason = e
                        .message
                        .as_deref()
                        .map(str::to_string)
                        .unwrap_or_else(|| e.code.to_string());
                    format!("{}: {}", field, reason)
                })
            })
            .collect();
        failures.sort();
        failures.join("; ")
    })
}
