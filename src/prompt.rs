//! Category-specific image prompts.

const EVERYDAY_OBJECTS: &str = "A single {description} shown clearly as the main subject.

Style: Clean 3D render or realistic product photography
- Object centered and filling 80% of frame
- Soft studio lighting from top-left
- IMPORTANT: Use soft BLUE-GRAY gradient background (not white!)
- Object should have realistic colors (NOT white/gray)
- High detail, photorealistic quality
- Show the object from its most recognizable angle
- CRITICAL: ABSOLUTELY NO TEXT, NO LETTERS, NO NUMBERS, NO WORDS, NO LABELS, NO BRAND NAMES anywhere in the image
- NO writing on the object, completely blank surface
- Just the object itself, nothing else";

const FOOD_DRINK: &str = "A delicious {word} photographed beautifully, centered in the frame.

Style: Food photography style
- Appetizing, fresh appearance
- Soft natural lighting
- Clean white or wooden surface
- Shallow depth of field
- NO text, NO letters, NO numbers, NO labels, NO packaging";

const TRAVEL: &str = "A {word} related to travel and transportation, centered as the main subject.

Style: Clean travel photography
- Bright, inviting outdoor daylight
- Clear blue sky or neutral background
- Professional quality
- NO text, NO letters, NO numbers, NO labels, NO signs with words";

const NATURE_ANIMALS: &str = "A {word} in its natural environment, centered as the main subject.

Style: Nature photography
- Beautiful natural outdoor lighting
- Vibrant colors
- Sharp focus on subject
- Peaceful, serene atmosphere
- NO text, NO letters, NO numbers, NO labels";

const SPORTS_HOBBIES: &str = "A {word} sport or hobby activity/equipment, centered in the frame.

Style: Dynamic sports photography
- Action or equipment clearly shown
- Energetic feel, bright even lighting
- Clean background
- NO text, NO letters, NO numbers, NO labels, NO logos";

const DEFAULT_TEMPLATE: &str = "A clear illustration of {word}.

Style: Clean modern illustration
- Subject centered and prominent
- Soft gradient background with even, soft lighting
- NO text, NO letters, NO numbers, NO labels
- Easily recognizable";

/// Category -> template. Anything not listed uses the default template.
const TEMPLATES: &[(&str, &str)] = &[
    ("everyday_objects", EVERYDAY_OBJECTS),
    ("food_drink", FOOD_DRINK),
    ("travel", TRAVEL),
    ("nature_animals", NATURE_ANIMALS),
    ("sports_hobbies", SPORTS_HOBBIES),
];

/// Returns the template registered for a category, or the default one.
pub fn template_for(category: &str) -> &'static str {
    TEMPLATES
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, template)| *template)
        .unwrap_or(DEFAULT_TEMPLATE)
}

/// Builds the image prompt for a word.
///
/// Templates that only mention `{word}` get the description appended as a
/// subject line so it still reaches the image model.
pub fn compose(word: &str, category: &str, description: &str) -> String {
    let word = word.trim();
    let description = description.trim();
    let template = template_for(category);

    let mut prompt = template
        .replace("{word}", word)
        .replace("{description}", description);

    if !template.contains("{description}")
        && !description.is_empty()
        && !description.eq_ignore_ascii_case(word)
    {
        prompt.push_str("\n\nSubject details: ");
        prompt.push_str(description);
    }
    prompt
}
