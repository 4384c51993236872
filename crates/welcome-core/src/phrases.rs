//! Everything the robot says, plus the registration error-code table.

/// Registration refused because the camera is not authorized.
pub const CAMERA_NOT_AUTHORIZED: i32 = 101303;
/// Registration refused because the face image is too blurry.
pub const FACE_TOO_BLURRY: i32 = 101305;

pub const NAME_PROMPT: &str = "Hello, I'm the welcome robot. May I have your name?";
pub const NAME_NOT_CAUGHT: &str = "Sorry, I didn't catch your name. Could you say it again?";
pub const NOTHING_HEARD: &str = "Sorry, I didn't hear anything. Could you say that again?";
pub const FACE_NOT_SEEN: &str =
    "Sorry, I couldn't see your face clearly. Please come a little closer and try again.";

const REGISTRATION_CAMERA_UNAUTHORIZED: &str =
    "The camera is not authorized, so I can't register your face.";
const REGISTRATION_BLURRY: &str =
    "Your face looks blurry. Please adjust the lighting and try again.";
const REGISTRATION_FAILED: &str = "Face registration failed. Please try again.";

pub fn greeting(name: &str) -> String {
    format!("Hello, {name}! Nice to see you again. How are you feeling today?")
}

pub fn confirmation(name: &str) -> String {
    format!("Okay, {name}, I'll remember you!")
}

/// Spoken explanation for a registration failure code. Unknown codes get a
/// generic retry message.
pub fn registration_failure(code: i32) -> &'static str {
    match code {
        CAMERA_NOT_AUTHORIZED => REGISTRATION_CAMERA_UNAUTHORIZED,
        FACE_TOO_BLURRY => REGISTRATION_BLURRY,
        _ => REGISTRATION_FAILED,
    }
}
