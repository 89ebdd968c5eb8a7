//! Platform permission identifiers used by the named groups

pub const ACCESS_FINE_LOCATION: &str = "android.permission.ACCESS_FINE_LOCATION";
pub const ACCESS_COARSE_LOCATION: &str = "android.permission.ACCESS_COARSE_LOCATION";
/// API 29+
pub const ACCESS_BACKGROUND_LOCATION: &str = "android.permission.ACCESS_BACKGROUND_LOCATION";

pub const READ_EXTERNAL_STORAGE: &str = "android.permission.READ_EXTERNAL_STORAGE";
pub const WRITE_EXTERNAL_STORAGE: &str = "android.permission.WRITE_EXTERNAL_STORAGE";

/// API 33+
pub const READ_MEDIA_IMAGES: &str = "android.permission.READ_MEDIA_IMAGES";
/// API 33+
pub const READ_MEDIA_VIDEO: &str = "android.permission.READ_MEDIA_VIDEO";
/// API 33+
pub const READ_MEDIA_AUDIO: &str = "android.permission.READ_MEDIA_AUDIO";
/// API 33+
pub const POST_NOTIFICATIONS: &str = "android.permission.POST_NOTIFICATIONS";

pub const CAMERA: &str = "android.permission.CAMERA";
pub const RECORD_AUDIO: &str = "android.permission.RECORD_AUDIO";

pub const READ_CONTACTS: &str = "android.permission.READ_CONTACTS";
pub const WRITE_CONTACTS: &str = "android.permission.WRITE_CONTACTS";
pub const GET_ACCOUNTS: &str = "android.permission.GET_ACCOUNTS";

pub const READ_CALENDAR: &str = "android.permission.READ_CALENDAR";
pub const WRITE_CALENDAR: &str = "android.permission.WRITE_CALENDAR";

pub const SEND_SMS: &str = "android.permission.SEND_SMS";
pub const RECEIVE_SMS: &str = "android.permission.RECEIVE_SMS";
pub const READ_SMS: &str = "android.permission.READ_SMS";
pub const RECEIVE_WAP_PUSH: &str = "android.permission.RECEIVE_WAP_PUSH";
pub const RECEIVE_MMS: &str = "android.permission.RECEIVE_MMS";

pub const READ_PHONE_STATE: &str = "android.permission.READ_PHONE_STATE";
/// API 26+
pub const READ_PHONE_NUMBERS: &str = "android.permission.READ_PHONE_NUMBERS";
pub const CALL_PHONE: &str = "android.permission.CALL_PHONE";
pub const READ_CALL_LOG: &str = "android.permission.READ_CALL_LOG";
pub const WRITE_CALL_LOG: &str = "android.permission.WRITE_CALL_LOG";
pub const ADD_VOICEMAIL: &str = "android.permission.ADD_VOICEMAIL";
pub const USE_SIP: &str = "android.permission.USE_SIP";
pub const PROCESS_OUTGOING_CALLS: &str = "android.permission.PROCESS_OUTGOING_CALLS";
