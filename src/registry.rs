//! Runtime Function Registry
//!
//! Bare call-site identifiers in template expressions resolve against a fixed,
//! closed registry of runtime functions. The registry decides which namespace
//! a function lives under; the expression converter only asks.

use lazy_static::lazy_static;
use std::collections::HashSet;

/// View-engine namespace emitted in front of view-level helpers.
pub const APP_VIEW_NAMESPACE: &str = "App.View";

/// General helper namespace for everything else in the registry.
pub const APP_HELPER_NAMESPACE: &str = "App.Helper";

lazy_static! {
    /// Functions that belong to the view engine itself.
    static ref VIEW_FUNCTIONS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for name in [
            "generateViewId", "execute", "evaluate", "escString", "text", "templateToDom",
            "view", "loadView", "renderView", "include", "includeIf", "extendView",
            "setSuperViewPath", "addViewEngine", "callViewEngineMounted",
            "startWrapper", "endWrapper", "registerSubscribe",
            "section", "yield", "yieldContent", "renderSections", "hasSection",
            "getChangedSections", "resetChangedSections", "isChangedSection", "emitChangedSections",
            "push", "stack", "once", "route", "on", "off", "emit",
            "init", "setApp", "setContainer", "clearOldRendering",
            "isAuth", "can", "cannot", "hasError", "firstError", "csrfToken",
            "foreach", "foreachTemplate",
        ] {
            s.insert(name);
        }
        s
    };

    /// The full closed registry. Anything callable from a template that is not
    /// listed here keeps its bare name in the output.
    static ref KNOWN_FUNCTIONS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for name in [
            "count", "min", "max", "abs", "ceil", "floor", "round", "sqrt",
            "strlen", "substr", "trim", "ltrim", "rtrim", "strtolower", "strtoupper",
            "isset", "empty", "is_null", "is_array", "is_string", "is_numeric",
            "array_key_exists", "in_array", "array_merge", "array_push", "array_pop",
            "json_encode", "json_decode", "md5", "sha1", "base64_encode", "base64_decode",
            "now", "today", "date", "time", "strtotime", "mktime",
            "diffInDays", "diffInHours", "diffInMinutes", "diffInSeconds",
            "addDays", "subDays", "addHours", "subHours", "addMinutes", "subMinutes",
            "format", "parse", "createFromFormat",
            "env", "config", "auth", "request", "response", "session", "cache",
            "view", "redirect", "route", "url", "asset", "mix",
            "collect", "dd", "dump", "logger", "abort", "old", "slug",
            "ucfirst", "lcfirst", "str_replace", "explode", "implode", "array_unique",
            "formatDate", "formatNumber", "formatCurrency", "truncate", "number_format",
            "updateTitle", "updateDescription", "updateKeywords",
            "getUrlParams", "buildUrl", "isInViewport", "scrollTo", "copyToClipboard",
            "getDeviceType", "isMobile", "isTablet", "isDesktop",
        ] {
            s.insert(name);
        }
        s
    };
}

/// Namespace prefix for a call-site identifier, or `None` when the identifier
/// is not in the registry and must stay bare.
pub fn function_prefix(name: &str) -> Option<&'static str> {
    if !KNOWN_FUNCTIONS.contains(name) {
        return None;
    }
    if VIEW_FUNCTIONS.contains(name) {
        Some(APP_VIEW_NAMESPACE)
    } else {
        Some(APP_HELPER_NAMESPACE)
    }
}
