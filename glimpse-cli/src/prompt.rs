//! Built-in analysis prompts.
//!
//! Either can be replaced per run with `--prompt`.

/// Detailed single-image analysis.
pub const IMAGE_ANALYSIS: &str = r"Analyze this image in detail:

1. People: Who is present? Describe appearance, clothing, pose, expression, body language, apparent age, gender, body type and emotional state.

2. Environment: Location, setting, background, lighting, color palette, atmosphere.

3. Actions: What is happening? Primary actions, interactions, objects in use.

4. Image Style: Visual style (photorealistic, anime, 3D render, painting, ...), medium, aesthetic genre, color grading, texture quality.

5. Camera: Shot type (wide, medium, close-up), angle (eye-level, high, low), depth of field, composition.

6. Camera Movement: Static or moving? Any panning, tilting, zooming or tracking? Stability and motion blur.

7. Lighting: Type (natural or artificial), direction, intensity, shadows, highlights, color temperature.

Provide clear, specific descriptions.";

/// Short per-frame analysis used for video.
pub const FRAME_ANALYSIS: &str = r"Analyze this video frame and describe:
1. People present (number, age, gender, clothing)
2. Environment (indoor/outdoor, setting, lighting)
3. Actions being performed
4. Camera style (wide shot, close-up, etc.)
5. Camera movement (pan, zoom, shake, etc.)

Be concise and specific in your descriptions.";

/// Token bound for single-image analysis.
pub const IMAGE_MAX_OUTPUT_TOKENS: u32 = 3000;
