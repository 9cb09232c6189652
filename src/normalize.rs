//! Text normalization: folds cosmetic character variants to a canonical form.
//!
//! [`normalize`] is a pure, total, idempotent function applied to **input text
//! only** — never to terms loaded into a [`crate::library::WordLibraryStore`].
//! That asymmetry is deliberate: the term list is the ground truth, the
//! normalizer is the attacker-side equalizer. Three passes run in a fixed
//! order — width fold, traditional→simplified fold, noise strip — each
//! returning `Cow::Borrowed` when it changes nothing, so fully canonical
//! input (the common case) costs no allocation at all.

use std::borrow::Cow;

/// Fold a fullwidth ASCII alphanumeric/punctuation character to its halfwidth
/// counterpart. Covers the fullwidth form block (U+FF01–U+FF5E, a fixed
/// offset from U+0021–U+007E) plus the ideographic space (U+3000 → U+0020).
/// Returns `None` when `c` needs no folding.
fn fold_width(c: char) -> Option<char> {
    match c {
        '\u{3000}' => Some(' '),
        '\u{FF01}'..='\u{FF5E}' => {
            let folded = (c as u32) - 0xFEE0;
            char::from_u32(folded)
        }
        _ => None,
    }
}

fn needs_width_fold(input: &str) -> bool {
    input.chars().any(|c| fold_width(c).is_some())
}

fn do_fold_width(input: &str) -> Cow<'_, str> {
    if !needs_width_fold(input) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        out.push(fold_width(c).unwrap_or(c));
    }
    Cow::Owned(out)
}

/// Curated high-frequency traditional→simplified Han character pairs.
///
/// Not sorted by codepoint (curated by frequency, not by code point order),
/// so lookup is a linear scan — fine for a table this size against text
/// bounded by the request-size caps enforced upstream.
static HAN_FOLD: &[(char, char)] = &[
    ('愛', '爱'), ('廠', '厂'), ('廣', '广'), ('東', '东'), ('絲', '丝'),
    ('國', '国'),
    ('兩', '两'), ('嚴', '严'), ('喪', '丧'), ('個', '个'), ('們', '们'),
    ('來', '来'), ('對', '对'), ('會', '会'), ('學', '学'), ('見', '见'),
    ('過', '过'), ('還', '还'), ('時', '时'), ('說', '说'), ('這', '这'),
    ('買', '买'), ('賣', '卖'), ('開', '开'), ('關', '关'), ('門', '门'),
    ('問', '问'), ('間', '间'), ('長', '长'), ('馬', '马'), ('鳥', '鸟'),
    ('魚', '鱼'), ('車', '车'), ('軍', '军'), ('農', '农'), ('書', '书'),
    ('當', '当'), ('從', '从'), ('業', '业'), ('萬', '万'), ('與', '与'),
    ('為', '为'), ('義', '义'), ('亂', '乱'), ('爭', '争'), ('產', '产'),
    ('畫', '画'), ('電', '电'), ('號', '号'), ('應', '应'), ('懷', '怀'),
    ('態', '态'), ('總', '总'), ('務', '务'), ('變', '变'), ('處', '处'),
    ('聲', '声'), ('壽', '寿'), ('實', '实'), ('寫', '写'), ('師', '师'),
    ('帶', '带'), ('廳', '厅'), ('歲', '岁'), ('歷', '历'), ('歸', '归'),
    ('殺', '杀'), ('毀', '毁'), ('氣', '气'), ('沒', '没'), ('無', '无'),
    ('點', '点'), ('熱', '热'), ('現', '现'), ('發', '发'), ('確', '确'),
    ('種', '种'), ('稱', '称'), ('窮', '穷'), ('類', '类'), ('紅', '红'),
    ('級', '级'), ('繼', '继'), ('續', '续'), ('網', '网'), ('線', '线'),
    ('縣', '县'), ('經', '经'), ('緊', '紧'), ('練', '练'), ('組', '组'),
    ('細', '细'), ('終', '终'), ('給', '给'), ('統', '统'), ('結', '结'),
    ('絕', '绝'), ('綠', '绿'), ('罵', '骂'), ('罰', '罚'), ('聽', '听'),
    ('聯', '联'), ('聰', '聪'), ('舊', '旧'), ('華', '华'), ('術', '术'),
    ('衛', '卫'), ('補', '补'), ('裝', '装'), ('裡', '里'), ('製', '制'),
    ('複', '复'), ('規', '规'), ('覺', '觉'), ('觀', '观'), ('計', '计'),
    ('認', '认'), ('誰', '谁'), ('課', '课'), ('談', '谈'), ('調', '调'),
    ('請', '请'), ('謝', '谢'), ('講', '讲'), ('證', '证'), ('議', '议'),
    ('護', '护'), ('讀', '读'), ('負', '负'), ('資', '资'), ('質', '质'),
    ('輕', '轻'), ('輛', '辆'), ('輸', '输'), ('轉', '转'), ('辦', '办'),
    ('達', '达'), ('遠', '远'), ('選', '选'), ('郵', '邮'), ('鄉', '乡'),
    ('釋', '释'), ('鍵', '键'), ('鐵', '铁'), ('雖', '虽'), ('雙', '双'),
    ('雞', '鸡'), ('離', '离'), ('難', '难'), ('響', '响'), ('頭', '头'),
    ('風', '风'), ('飛', '飞'), ('飯', '饭'), ('館', '馆'), ('體', '体'),
    ('鮮', '鲜'), ('麗', '丽'), ('麥', '麦'), ('黃', '黄'), ('黨', '党'),
];

fn fold_han(c: char) -> Option<char> {
    HAN_FOLD.iter().find(|&&(k, _)| k == c).map(|&(_, v)| v)
}

fn needs_han_fold(input: &str) -> bool {
    input.chars().any(|c| fold_han(c).is_some())
}

fn do_fold_han(input: &str) -> Cow<'_, str> {
    if !needs_han_fold(input) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        out.push(fold_han(c).unwrap_or(c));
    }
    Cow::Owned(out)
}

/// A character survives the noise-strip pass iff it is alphanumeric or falls
/// within the CJK Unified Ideographs block (U+4E00–U+9FFF).
fn is_kept(c: char) -> bool {
    c.is_alphanumeric() || ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

fn do_strip_noise(input: &str) -> Cow<'_, str> {
    if input.chars().all(is_kept) {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.chars().filter(|&c| is_kept(c)).collect())
}

/// Fold cosmetic character variants in `input` to a canonical form.
///
/// Three passes run in order: width fold, traditional→simplified fold, noise
/// strip. The result is always the same length or shorter than the input and
/// the function is idempotent: `normalize(&normalize(s)) == normalize(s)`.
///
/// Returns `Cow::Borrowed` when no pass changed anything, avoiding an
/// allocation on already-canonical input.
#[must_use]
pub fn normalize(input: &str) -> Cow<'_, str> {
    let widened = do_fold_width(input);
    let hanned = match widened {
        Cow::Borrowed(s) => do_fold_han(s),
        Cow::Owned(s) => Cow::Owned(do_fold_han(&s).into_owned()),
    };
    match hanned {
        Cow::Borrowed(s) => do_strip_noise(s),
        Cow::Owned(s) => Cow::Owned(do_strip_noise(&s).into_owned()),
    }
}
